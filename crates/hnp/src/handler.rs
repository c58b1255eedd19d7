//! Per-connection handler: JOIN handshake, admission, frame pumping.
//!
//! Each accepted connection gets its own Tokio task running this handler.
//! The flow is:
//!   1. Receive `JOIN` → check the protocol fingerprint
//!   2. Ask the room manager for a room → `JOINED` or `REJECTED`
//!   3. Spawn a writer task draining the member's outbound queue
//!   4. Loop: receive frames → forward to the room actor
//!
//! The [`Admission`] lives in this task; dropping it on any exit path
//! releases the membership.

use std::sync::Arc;
use std::time::Duration;

use hnp_protocol::{is_system_frame, ProtocolError, RejectCode, SystemFrame};
use hnp_room::{member_channel, Admission, AdmissionRequest, MemberReceiver, RoomOutbound};
use hnp_transport::{Connection, TransportError};

use crate::server::ServerState;
use crate::HnpError;

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection<C>(conn: C, state: Arc<ServerState>) -> Result<(), HnpError>
where
    C: Connection<Error = TransportError>,
{
    let conn_id = conn.id();
    tracing::debug!(%conn_id, "handling new connection");

    // --- Step 1: Handshake ---
    let requested = match perform_handshake(&conn, &state).await {
        Ok(room) => room,
        Err(e) => {
            let _ = conn.close().await;
            return Err(e);
        }
    };

    // --- Step 2: Admission ---
    let (sender, outbound) = member_channel(state.outbound_buffer);
    let request = AdmissionRequest {
        conn: conn_id,
        room: requested,
        sender,
    };
    let admission = match state.manager.admit(request).await {
        Ok(admission) => admission,
        Err(e) => {
            tracing::info!(%conn_id, error = %e, "admission refused");
            reject(&conn, e.reject_code()).await;
            let _ = conn.close().await;
            return Err(e.into());
        }
    };

    let joined = SystemFrame::Joined {
        room: admission.room_id(),
        connection: conn_id,
    };
    conn.send(&joined.encode()).await?;
    tracing::info!(%conn_id, room_id = %admission.room_id(), "connection joined");

    // --- Step 3: Writer ---
    let conn = Arc::new(conn);
    let mut writer = tokio::spawn(write_loop(
        Arc::clone(&conn),
        outbound,
        state.send_timeout,
    ));

    // --- Step 4: Reader ---
    let result = tokio::select! {
        result = read_loop(conn.as_ref(), &admission) => result,
        _ = &mut writer => {
            tracing::debug!(%conn_id, "writer finished, stopping reader");
            Ok(())
        }
    };

    drop(admission);
    writer.abort();
    let _ = conn.close().await;
    tracing::info!(%conn_id, "connection closed");
    result
}

/// Waits for `JOIN` and validates it. Returns the requested room.
async fn perform_handshake<C>(
    conn: &C,
    state: &ServerState,
) -> Result<Option<hnp_protocol::RoomId>, HnpError>
where
    C: Connection<Error = TransportError>,
{
    let data = match tokio::time::timeout(state.join_timeout, conn.recv()).await {
        Ok(Ok(Some(data))) => data,
        Ok(Ok(None)) => {
            return Err(ProtocolError::InvalidMessage("connection closed before JOIN".into()).into());
        }
        Ok(Err(e)) => return Err(e.into()),
        Err(_) => {
            reject(conn, RejectCode::BadHandshake).await;
            return Err(ProtocolError::InvalidMessage("JOIN timed out".into()).into());
        }
    };

    let (room, fingerprint) = match SystemFrame::decode(&data) {
        Ok(SystemFrame::Join { room, fingerprint }) => (room, fingerprint),
        Ok(_) | Err(_) => {
            reject(conn, RejectCode::BadHandshake).await;
            return Err(ProtocolError::InvalidMessage("first frame must be JOIN".into()).into());
        }
    };

    let expected = state.protocol.fingerprint();
    if fingerprint != expected {
        tracing::info!(conn_id = %conn.id(), expected, got = fingerprint, "protocol fingerprint mismatch");
        reject(conn, RejectCode::FingerprintMismatch).await;
        return Err(ProtocolError::InvalidMessage("protocol fingerprint mismatch".into()).into());
    }

    Ok(room)
}

/// Sends `REJECTED`. Best effort: the connection is closed right after.
async fn reject<C>(conn: &C, code: RejectCode)
where
    C: Connection<Error = TransportError>,
{
    let frame = SystemFrame::Rejected { code }.encode();
    if let Err(e) = conn.send(&frame).await {
        tracing::debug!(conn_id = %conn.id(), error = %e, "failed to send REJECTED");
    }
}

async fn read_loop<C>(conn: &C, admission: &Admission) -> Result<(), HnpError>
where
    C: Connection<Error = TransportError>,
{
    let conn_id = conn.id();
    loop {
        let data = match conn.recv().await {
            Ok(Some(data)) => data,
            Ok(None) => {
                tracing::info!(%conn_id, "connection closed by client");
                return Ok(());
            }
            Err(e) => {
                tracing::debug!(%conn_id, error = %e, "recv error");
                return Err(e.into());
            }
        };

        if is_system_frame(&data) {
            tracing::debug!(%conn_id, tag = data[0], "ignoring system frame after JOIN");
            continue;
        }

        if admission.send_frame(data).await.is_err() {
            tracing::debug!(%conn_id, "room gone, stopping reader");
            return Ok(());
        }
    }
}

/// Drains the member's outbound queue onto the connection. A close notice
/// jumps the queue; frames still waiting behind it are abandoned.
async fn write_loop<C>(conn: Arc<C>, mut outbound: MemberReceiver, send_timeout: Duration)
where
    C: Connection<Error = TransportError>,
{
    let conn_id = conn.id();
    while let Some(item) = outbound.recv().await {
        match item {
            RoomOutbound::Frame(frame) => {
                match tokio::time::timeout(send_timeout, conn.send(&frame)).await {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => {
                        tracing::debug!(%conn_id, error = %e, "send failed");
                        break;
                    }
                    Err(_) => {
                        tracing::warn!(%conn_id, ?send_timeout, "send timed out, dropping connection");
                        break;
                    }
                }
            }
            RoomOutbound::Closed { reason } => {
                let frame = SystemFrame::Closing { reason }.encode();
                let _ = tokio::time::timeout(send_timeout, conn.send(&frame)).await;
                break;
            }
        }
    }
    let _ = conn.close().await;
}
