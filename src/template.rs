//! Turns a [`DocumentView`] into Typst markup through a Tera template.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use tera::{Context, Tera, Value};
use tracing::info;

use crate::document::DocumentView;
use crate::error::RenderError;

// Embed template at compile time so a fresh install always has one
pub const DEFAULT_TEMPLATE: &str = include_str!("../templates/invoice.typ.tera");
pub const TEMPLATE_NAME: &str = "invoice.typ.tera";

pub struct InvoiceTemplate {
    tera: Tera,
    font_family: Option<String>,
}

impl InvoiceTemplate {
    pub fn builtin() -> Result<Self, RenderError> {
        Self::from_source(DEFAULT_TEMPLATE)
    }

    pub fn from_source(source: &str) -> Result<Self, RenderError> {
        let mut tera = Tera::default();
        tera.register_filter("typst", typst_filter);
        tera.add_raw_template(TEMPLATE_NAME, source)?;
        Ok(Self {
            tera,
            font_family: None,
        })
    }

    /// Uses `<dir>/invoice.typ.tera`, writing the built-in layout there
    /// first if it does not exist yet.
    pub fn load(dir: &Path) -> Result<Self, RenderError> {
        let path = dir.join(TEMPLATE_NAME);
        if !path.exists() {
            fs::create_dir_all(dir)?;
            info!(path = %path.display(), "initializing default template");
            fs::write(&path, DEFAULT_TEMPLATE)?;
        }
        let source = fs::read_to_string(&path)?;
        Self::from_source(&source)
    }

    pub fn with_font_family(mut self, family: Option<String>) -> Self {
        self.font_family = family;
        self
    }

    pub fn render(&self, view: &DocumentView) -> Result<String, RenderError> {
        let mut context = Context::new();
        context.insert("doc", view);
        context.insert("font", &self.font_family);
        Ok(self.tera.render(TEMPLATE_NAME, &context)?)
    }
}

fn typst_filter(value: &Value, _args: &HashMap<String, Value>) -> tera::Result<Value> {
    let text = match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    };
    Ok(Value::String(typst_string(&text)))
}

/// Quotes text as a Typst string literal.
pub fn typst_string(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push('"');
    for ch in text.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() => out.push_str(&format!("\\u{{{:x}}}", c as u32)),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{DocumentOptions, build_document};
    use crate::model::InvoiceRecord;
    use pretty_assertions::assert_eq;

    fn render(record: &InvoiceRecord, options: DocumentOptions) -> String {
        let view = build_document(record, options, record.total());
        InvoiceTemplate::builtin().unwrap().render(&view).unwrap()
    }

    #[test]
    fn escapes_typst_strings() {
        assert_eq!(typst_string("plain"), r#""plain""#);
        assert_eq!(typst_string(r#"a"b\c"#), r#""a\"b\\c""#);
        assert_eq!(typst_string("line\nnext"), r#""line\nnext""#);
        assert_eq!(typst_string("#set page(\"x\")"), r##""#set page(\"x\")""##);
        assert_eq!(typst_string("\u{1}"), r#""\u{1}""#);
    }

    #[test]
    fn renders_every_block() {
        let source = render(&InvoiceRecord::default(), DocumentOptions::default());
        assert!(source.contains(r#"#set page(paper: "a4", margin: 30pt)"#));
        assert!(source.contains(r#""株式会社○○ 御中""#));
        assert!(source.contains(r#""登録番号: T1234567890123""#));
        assert!(source.contains(r#""税率""#));
        assert!(source.contains(r#""10%""#));
        assert!(source.contains(r#""example@email.com""#));
        assert_eq!(source.matches(r#""¥3,000""#).count(), 3);
        assert!(!source.contains("font:"));
    }

    #[test]
    fn flags_remove_optional_parts() {
        let options = DocumentOptions {
            show_tax_registration: false,
            show_email: false,
        };
        let source = render(&InvoiceRecord::default(), options);
        assert!(!source.contains("登録番号"));
        assert!(!source.contains(r#""税率""#));
        assert!(!source.contains(r#""10%""#));
        assert!(!source.contains("メール"));
        assert!(source.contains(r#""ID @""#));
    }

    #[test]
    fn user_text_cannot_inject_markup() {
        let record = InvoiceRecord::default().with_recipient("\"), #panic(\"boom");
        let source = render(&record, DocumentOptions::default());
        assert!(source.contains(r#""\"), #panic(\"boom""#));
    }

    #[test]
    fn font_family_is_passed_through() {
        let view = build_document(
            &InvoiceRecord::default(),
            DocumentOptions::default(),
            3000.0,
        );
        let source = InvoiceTemplate::builtin()
            .unwrap()
            .with_font_family(Some("IPAGothic".into()))
            .render(&view)
            .unwrap();
        assert!(source.contains(r#"lang: "ja", font: "IPAGothic")"#));
    }

    #[test]
    fn load_writes_default_once() {
        let dir = tempfile::tempdir().unwrap();
        let templates = dir.path().join("templates");
        InvoiceTemplate::load(&templates).unwrap();
        let written = fs::read_to_string(templates.join(TEMPLATE_NAME)).unwrap();
        assert_eq!(written, DEFAULT_TEMPLATE);

        fs::write(templates.join(TEMPLATE_NAME), "custom {{ doc.recipient }}").unwrap();
        let view = build_document(&InvoiceRecord::default(), DocumentOptions::default(), 0.0);
        let source = InvoiceTemplate::load(&templates).unwrap().render(&view).unwrap();
        assert_eq!(source, "custom 株式会社○○ 御中");
    }
}
