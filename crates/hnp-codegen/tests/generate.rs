//! End-to-end generator runs against a temporary output directory.

use hnp_codegen::{
    generate, GenerateOptions, GenerationError, HtmlDocument, DEBUG_CSS, DEBUG_JS, PROTOCOL_JS,
};
use hnp_schema::{validate, Direction, FieldDef, MessageDef, ProtocolSchema, ValidatedSchema};

const SHELL: &str = "<!DOCTYPE html>\n<html>\n<head><title>cart</title></head>\n<body>\n\
                     <canvas id=\"canvas\"></canvas>\n<script src=\"cart.js\"></script>\n</body>\n</html>\n";

fn schema() -> ValidatedSchema {
    validate(
        &ProtocolSchema::default()
            .message(MessageDef::heartbeat("ping"))
            .message(
                MessageDef::new("input", Direction::ClientToServer)
                    .field(FieldDef::new("buttons", "uint8")),
            )
            .message(
                MessageDef::new("world", Direction::ServerToClient)
                    .field(FieldDef::new("xs", "int16[8]")),
            ),
    )
    .unwrap()
}

fn opts() -> GenerateOptions {
    GenerateOptions {
        html: Some(HtmlDocument::new("index.html", SHELL)),
        ..Default::default()
    }
}

fn html_of(options: &GenerateOptions) -> String {
    generate(&schema(), options)
        .unwrap()
        .html()
        .expect("html output")
        .content
        .clone()
}

// =======================================================================
// Determinism
// =======================================================================

#[test]
fn test_generation_is_byte_identical() {
    let options = GenerateOptions {
        with_debugger: true,
        embed: true,
        ..opts()
    };
    let a = generate(&schema(), &options).unwrap();
    let b = generate(&schema(), &options).unwrap();
    assert_eq!(a, b);
}

#[test]
fn test_files_without_debugger() {
    let assets = generate(&schema(), &GenerateOptions::default()).unwrap();
    let names: Vec<_> = assets.files().map(|(name, _)| name).collect();
    assert_eq!(names, vec![PROTOCOL_JS]);
    assert!(assets.html().is_none());
}

#[test]
fn test_files_with_debugger() {
    let options = GenerateOptions {
        with_debugger: true,
        ..Default::default()
    };
    let assets = generate(&schema(), &options).unwrap();
    let names: Vec<_> = assets.files().map(|(name, _)| name).collect();
    assert_eq!(names, vec![DEBUG_CSS, DEBUG_JS, PROTOCOL_JS]);
}

// =======================================================================
// HTML transforms
// =======================================================================

#[test]
fn test_embed_is_idempotent() {
    let options = GenerateOptions {
        embed: true,
        ..opts()
    };
    let once = html_of(&options);
    let twice = html_of(&GenerateOptions {
        html: Some(HtmlDocument::new("index.html", once.clone())),
        ..options
    });
    assert_eq!(once, twice);
    assert_eq!(once.matches("<!-- hnp:begin protocol -->").count(), 1);
    assert!(once.contains("function encodeInput(msg)"));
}

#[test]
fn test_import_replaces_embed() {
    let embedded = html_of(&GenerateOptions {
        embed: true,
        with_debugger: true,
        ..opts()
    });
    let imported = html_of(&GenerateOptions {
        import: true,
        asset_prefix: "js/".into(),
        html: Some(HtmlDocument::new("index.html", embedded)),
        ..Default::default()
    });
    assert!(imported.contains("<script src=\"js/hnp-protocol.js\"></script>"));
    assert!(!imported.contains("function encodeInput"));
    assert!(!imported.contains("hnp:begin debugger"));
}

#[test]
fn test_remove_restores_shell() {
    let imported = html_of(&GenerateOptions {
        import: true,
        with_debugger: true,
        ..opts()
    });
    let removed = html_of(&GenerateOptions {
        remove: true,
        html: Some(HtmlDocument::new("index.html", imported)),
        ..Default::default()
    });
    assert_eq!(removed, SHELL);
}

#[test]
fn test_remove_debugger_keeps_protocol() {
    let imported = html_of(&GenerateOptions {
        import: true,
        with_debugger: true,
        ..opts()
    });
    let html = html_of(&GenerateOptions {
        remove_debugger: true,
        html: Some(HtmlDocument::new("index.html", imported)),
        ..Default::default()
    });
    assert!(html.contains("hnp-protocol.js"));
    assert!(!html.contains("hnp-debug"));
}

// =======================================================================
// Filesystem
// =======================================================================

#[test]
fn test_write_to_creates_every_file() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("web");
    let assets = generate(
        &schema(),
        &GenerateOptions {
            with_debugger: true,
            import: true,
            ..opts()
        },
    )
    .unwrap();

    let written = assets.write_to(&out).unwrap();
    assert_eq!(written.len(), 4);
    for name in [PROTOCOL_JS, DEBUG_JS, DEBUG_CSS, "index.html"] {
        assert!(out.join(name).is_file(), "{name} missing");
    }
    let html = std::fs::read_to_string(out.join("index.html")).unwrap();
    assert!(html.contains("hnp:begin protocol"));
}

#[test]
fn test_conflicting_options_write_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let result = generate(
        &schema(),
        &GenerateOptions {
            embed: true,
            import: true,
            ..opts()
        },
    );

    assert!(matches!(result, Err(GenerationError::ConflictingOptions(_))));
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}
