//! JavaScript binding emitter.
//!
//! The output is a single IIFE that installs `window.HNP`. Static pieces
//! (reader/writer runtime, system frames, socket helper) come from
//! `assets/`; per-message encoders and decoders are generated here.

use hnp_schema::{FieldType, Primitive, ValidatedField, ValidatedMessage, ValidatedSchema, GPIO_SIZE};
use serde::Serialize;

use crate::GenerationError;

const RUNTIME: &str = include_str!("../assets/runtime.js");
const SYSTEM: &str = include_str!("../assets/system.js");

/// Indenting line buffer.
struct Out {
    buf: String,
    indent: usize,
}

impl Out {
    fn new() -> Self {
        Self {
            buf: String::new(),
            indent: 0,
        }
    }

    fn line(&mut self, text: &str) {
        if !text.is_empty() {
            for _ in 0..self.indent {
                self.buf.push_str("  ");
            }
            self.buf.push_str(text);
        }
        self.buf.push('\n');
    }

    fn open(&mut self, text: &str) {
        self.line(text);
        self.indent += 1;
    }

    fn close(&mut self, text: &str) {
        self.indent = self.indent.saturating_sub(1);
        self.line(text);
    }

    fn raw(&mut self, text: &str) {
        self.buf.push_str(text);
        if !text.ends_with('\n') {
            self.buf.push('\n');
        }
    }
}

/// Schema description embedded for tooling such as the debugger panel.
#[derive(Serialize)]
struct MessageSummary<'a> {
    tag: u8,
    name: &'a str,
    direction: String,
    fields: Vec<FieldSummary<'a>>,
}

#[derive(Serialize)]
struct FieldSummary<'a> {
    name: &'a str,
    #[serde(rename = "type")]
    ty: String,
    optional: bool,
}

pub(crate) fn protocol_js(schema: &ValidatedSchema) -> Result<String, GenerationError> {
    let summary: Vec<_> = schema
        .messages()
        .iter()
        .map(|m| MessageSummary {
            tag: m.tag,
            name: &m.name,
            direction: m.direction.to_string(),
            fields: m
                .fields
                .iter()
                .map(|f| FieldSummary {
                    name: &f.name,
                    ty: f.ty.to_string(),
                    optional: f.optional,
                })
                .collect(),
        })
        .collect();
    let summary = serde_json::to_string(&summary)?;

    let mut out = Out::new();
    out.line("// Generated by hnp. Do not edit.");
    out.line(&format!(
        "// Protocol fingerprint {:#010x}, {} message(s).",
        schema.fingerprint(),
        schema.messages().len()
    ));
    out.open("(function (global) {");
    out.line("\"use strict\";");
    out.line("");
    out.line(&format!("const FINGERPRINT = {:#010x};", schema.fingerprint()));
    out.line(&format!("const GPIO_SIZE = {GPIO_SIZE};"));
    out.line(&format!("const SCHEMA = {summary};"));
    out.line("");
    out.raw(RUNTIME);

    for message in schema.messages() {
        out.line("");
        write_encoder(&mut out, message);
        out.line("");
        write_reader(&mut out, message);
        out.line("");
        out.open(&format!("function decode{}(input) {{", message.ident));
        out.line(&format!(
            "return decodeAs({}, read{}, input);",
            message.tag, message.ident
        ));
        out.close("}");
    }

    out.line("");
    out.open("const MESSAGES = [");
    for message in schema.messages() {
        out.line(&format!(
            "{{ name: \"{}\", direction: \"{}\", encode: encode{ident}, read: read{ident} }},",
            message.name,
            message.direction,
            ident = message.ident
        ));
    }
    out.close("];");
    out.line("");
    out.raw(SYSTEM);
    out.line("");

    out.open("global.HNP = Object.freeze({");
    for name in [
        "FINGERPRINT",
        "GPIO_SIZE",
        "SCHEMA",
        "DecodeError",
        "decode",
        "decodeAt",
        "isSystemFrame",
        "encodeJoin",
        "decodeSystem",
        "connect",
    ] {
        out.line(&format!("{name}: {name},"));
    }
    for message in schema.messages() {
        out.line(&format!("encode{0}: encode{0},", message.ident));
        out.line(&format!("decode{0}: decode{0},", message.ident));
    }
    out.close("});");
    out.close("})(typeof window !== \"undefined\" ? window : globalThis);");
    Ok(out.buf)
}

fn write_encoder(out: &mut Out, message: &ValidatedMessage) {
    let param = if message.fields.is_empty() { "" } else { "msg" };
    out.open(&format!("function encode{}({param}) {{", message.ident));
    out.line("const w = new Writer();");
    out.line(&format!("w.u8({});", message.tag));
    for field in &message.fields {
        write_field_encoder(out, &message.name, field);
    }
    out.line("return w.finish();");
    out.close("}");
}

fn write_field_encoder(out: &mut Out, message: &str, field: &ValidatedField) {
    let value = format!("msg.{}", field.name);
    let path = format!("{message}.{}", field.name);

    if field.optional {
        out.open(&format!("if ({value} === undefined || {value} === null) {{"));
        out.line("w.u8(0);");
        out.close("} else {");
        out.indent += 1;
        out.line("w.u8(1);");
    }

    match field.ty {
        FieldType::Scalar(p) => out.line(&encode_scalar(p, &value, &path)),
        FieldType::Str { max_len } => {
            out.line(&format!("w.str({value}, {max_len}, \"{path}\");"))
        }
        FieldType::Array { elem, len } => {
            out.line(&format!("checkArray({value}, {len}, \"{path}\");"));
            out.line(&format!(
                "for (let i = 0; i < {len}; i++) {}",
                encode_scalar(elem, &format!("{value}[i]"), &path)
            ));
        }
    }

    if field.optional {
        out.close("}");
    }
}

fn encode_scalar(p: Primitive, value: &str, path: &str) -> String {
    if let Some((min, max)) = p.int_range() {
        return format!("w.int({value}, {}, {min}, {max}, \"{path}\");", p.size());
    }
    match p {
        Primitive::Float => format!("w.float({value});"),
        _ => format!("w.bool({value});"),
    }
}

fn write_reader(out: &mut Out, message: &ValidatedMessage) {
    let param = if message.fields.is_empty() { "" } else { "r" };
    out.open(&format!("function read{}({param}) {{", message.ident));
    out.line("const msg = {};");
    for field in &message.fields {
        let expr = match field.ty {
            FieldType::Scalar(p) => decode_scalar(p).to_string(),
            FieldType::Str { max_len } => format!("r.str({max_len})"),
            FieldType::Array { elem, len } => {
                format!("r.array({len}, () => {})", decode_scalar(elem))
            }
        };
        if field.optional {
            out.line(&format!("msg.{} = r.present() ? {expr} : null;", field.name));
        } else {
            out.line(&format!("msg.{} = {expr};", field.name));
        }
    }
    out.line("return msg;");
    out.close("}");
}

fn decode_scalar(p: Primitive) -> &'static str {
    match p {
        Primitive::Int8 => "r.i8()",
        Primitive::UInt8 => "r.u8()",
        Primitive::Int16 => "r.i16()",
        Primitive::UInt16 => "r.u16()",
        Primitive::Int32 => "r.i32()",
        Primitive::UInt32 => "r.u32()",
        Primitive::Float => "r.float()",
        Primitive::Bool => "r.bool()",
    }
}
