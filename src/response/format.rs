use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use serde_json::Value;
use thiserror::Error;

use super::envelope::{Envelope, ErrorDetails};

/// Root element name of XML-rendered envelopes
pub const XML_ROOT: &str = "response";

/// Element holding one entry of an object; the key goes in its `name` attribute
pub const XML_FIELD: &str = "field";

/// Element holding one item of an array
pub const XML_ITEM: &str = "item";

/// Wire representation requested by the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResponseFormat {
    #[default]
    Json,
    Xml,
}

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("failed to render JSON envelope: {0}")]
    Json(#[from] serde_json::Error),
    #[error("failed to render XML envelope: {0}")]
    Xml(String),
}

impl ResponseFormat {
    /// Pick a format from an `Accept` header value.
    ///
    /// Media ranges are inspected in the order given and the first one we can
    /// produce wins. Anything else, including a missing header, yields JSON.
    pub fn negotiate(accept: Option<&str>) -> Self {
        accept
            .into_iter()
            .flat_map(|value| value.split(','))
            .filter_map(|range| Self::from_media_type(range))
            .next()
            .unwrap_or_default()
    }

    fn from_media_type(range: &str) -> Option<Self> {
        let media_type = range.split(';').next().unwrap_or("").trim();
        if media_type.eq_ignore_ascii_case("application/json") {
            Some(Self::Json)
        } else if media_type.eq_ignore_ascii_case("application/xml")
            || media_type.eq_ignore_ascii_case("text/xml")
        {
            Some(Self::Xml)
        } else {
            None
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            Self::Json => "application/json",
            Self::Xml => "application/xml",
        }
    }
}

/// Serialize an envelope in the requested representation
pub fn render(envelope: &Envelope, format: ResponseFormat) -> Result<Vec<u8>, RenderError> {
    match format {
        ResponseFormat::Json => Ok(serde_json::to_vec(envelope)?),
        ResponseFormat::Xml => render_xml(envelope),
    }
}

/// Envelope fields become elements in wire order. Free-form keys (field errors,
/// payload objects) never become tag names, so any key renders.
fn render_xml(envelope: &Envelope) -> Result<Vec<u8>, RenderError> {
    let mut xml = XmlWriter::new();

    xml.start(BytesStart::new(XML_ROOT))?;
    xml.text_element("status_code", &envelope.status_code.to_string())?;
    xml.text_element("request_id", &envelope.request_id)?;
    xml.text_element("message", &envelope.message)?;

    match &envelope.error {
        Some(error) => {
            xml.start(BytesStart::new("error"))?;
            xml.text_element("error_code", &error.code)?;
            match &error.details {
                Some(ErrorDetails::FieldErrors(fields)) => {
                    xml.start(BytesStart::new("details"))?;
                    for (name, message) in fields {
                        xml.start(field_tag(name))?;
                        xml.text(message)?;
                        xml.end(XML_FIELD)?;
                    }
                    xml.end("details")?;
                }
                Some(ErrorDetails::Cause(cause)) => xml.text_element("details", cause)?,
                None => xml.empty(BytesStart::new("details"))?,
            }
            xml.end("error")?;
        }
        None => xml.empty(BytesStart::new("error"))?,
    }

    match &envelope.data {
        Some(data) => xml.value(BytesStart::new("data"), "data", data)?,
        None => xml.empty(BytesStart::new("data"))?,
    }

    xml.end(XML_ROOT)?;
    Ok(xml.into_inner())
}

fn field_tag(name: &str) -> BytesStart<'static> {
    let mut tag = BytesStart::new(XML_FIELD);
    tag.push_attribute(("name", name));
    tag
}

struct XmlWriter {
    writer: Writer<Vec<u8>>,
}

impl XmlWriter {
    fn new() -> Self {
        Self {
            writer: Writer::new(Vec::new()),
        }
    }

    fn into_inner(self) -> Vec<u8> {
        self.writer.into_inner()
    }

    fn event(&mut self, event: Event<'_>) -> Result<(), RenderError> {
        self.writer
            .write_event(event)
            .map_err(|e| RenderError::Xml(e.to_string()))
    }

    fn start(&mut self, tag: BytesStart<'_>) -> Result<(), RenderError> {
        self.event(Event::Start(tag))
    }

    fn end(&mut self, name: &str) -> Result<(), RenderError> {
        self.event(Event::End(BytesEnd::new(name)))
    }

    fn empty(&mut self, tag: BytesStart<'_>) -> Result<(), RenderError> {
        self.event(Event::Empty(tag))
    }

    fn text(&mut self, text: &str) -> Result<(), RenderError> {
        self.event(Event::Text(BytesText::new(text)))
    }

    fn text_element(&mut self, name: &str, text: &str) -> Result<(), RenderError> {
        self.start(BytesStart::new(name))?;
        self.text(text)?;
        self.end(name)
    }

    /// Null is an empty element, arrays wrap each entry in `<item>`, objects
    /// wrap each entry in `<field name="..">`
    fn value(&mut self, tag: BytesStart<'_>, name: &str, value: &Value) -> Result<(), RenderError> {
        match value {
            Value::Null => return self.empty(tag),
            Value::String(text) => {
                self.start(tag)?;
                self.text(text)?;
            }
            Value::Bool(_) | Value::Number(_) => {
                self.start(tag)?;
                self.text(&value.to_string())?;
            }
            Value::Array(items) => {
                self.start(tag)?;
                for item in items {
                    self.value(BytesStart::new(XML_ITEM), XML_ITEM, item)?;
                }
            }
            Value::Object(entries) => {
                self.start(tag)?;
                for (key, entry) in entries {
                    self.value(field_tag(key), XML_FIELD, entry)?;
                }
            }
        }
        self.end(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::{Exception, FieldErrors};
    use serde_json::{json, Value};

    #[test]
    fn test_negotiate_defaults_to_json() {
        assert_eq!(ResponseFormat::negotiate(None), ResponseFormat::Json);
        assert_eq!(ResponseFormat::negotiate(Some("")), ResponseFormat::Json);
        assert_eq!(ResponseFormat::negotiate(Some("text/plain")), ResponseFormat::Json);
        assert_eq!(ResponseFormat::negotiate(Some("*/*")), ResponseFormat::Json);
    }

    #[test]
    fn test_negotiate_recognised_types() {
        assert_eq!(
            ResponseFormat::negotiate(Some("application/json")),
            ResponseFormat::Json
        );
        assert_eq!(
            ResponseFormat::negotiate(Some("application/xml")),
            ResponseFormat::Xml
        );
        assert_eq!(
            ResponseFormat::negotiate(Some("text/xml; charset=utf-8")),
            ResponseFormat::Xml
        );
        assert_eq!(
            ResponseFormat::negotiate(Some("text/html, application/xml;q=0.9, */*;q=0.8")),
            ResponseFormat::Xml
        );
        assert_eq!(
            ResponseFormat::negotiate(Some("Application/JSON, application/xml")),
            ResponseFormat::Json
        );
    }

    #[test]
    fn test_json_round_trip_is_lossless() {
        let mut fields = FieldErrors::new();
        fields.insert("email".to_string(), "invalid".to_string());

        let envelopes = [
            Envelope::success().with_request_id("a"),
            Envelope::created(),
            Envelope::with_data(json!({"id": 1, "tags": ["x", "y"]})).with_request_id("b"),
            Envelope::from_exception(&Exception::invalid_parameter("bad input", fields)),
            Envelope::from_exception(&Exception::not_found("gone").with_cause("no rows")),
            Envelope::bad_request("malformed", Some(&"eof")),
        ];

        for envelope in envelopes {
            let bytes = render(&envelope, ResponseFormat::Json).unwrap();
            let parsed: Envelope = serde_json::from_slice(&bytes).unwrap();
            assert_eq!(parsed, envelope);
        }
    }

    #[test]
    fn test_xml_rendering() {
        let envelope = Envelope::from_exception(&Exception::not_found("user missing"))
            .with_request_id("req-42");
        let bytes = render(&envelope, ResponseFormat::Xml).unwrap();
        let xml = String::from_utf8(bytes).unwrap();

        assert!(xml.starts_with("<response>"));
        assert!(xml.contains("<status_code>404</status_code>"));
        assert!(xml.contains("<request_id>req-42</request_id>"));
        assert!(xml.contains("<message>user missing</message>"));
        assert!(xml.contains("<error_code>NOT_FOUND</error_code>"));
    }

    #[test]
    fn test_xml_field_errors() {
        let mut fields = FieldErrors::new();
        fields.insert("email".to_string(), "email is not a valid email".to_string());
        let envelope = Envelope::from_exception(&Exception::invalid_parameter("bad", fields));
        let xml = String::from_utf8(render(&envelope, ResponseFormat::Xml).unwrap()).unwrap();

        assert!(xml.contains(
            "<details><field name=\"email\">email is not a valid email</field></details>"
        ));
        assert!(xml.contains("<data/>"));
    }

    #[test]
    fn test_xml_labels_that_are_not_xml_names() {
        let mut fields = FieldErrors::new();
        fields.insert("Email Address".to_string(), "Email Address is required".to_string());
        fields.insert("2fa".to_string(), "2fa must be numeric".to_string());
        let envelope = Envelope::from_exception(&Exception::invalid_parameter("bad", fields))
            .with_request_id("req-1");

        let xml = String::from_utf8(render(&envelope, ResponseFormat::Xml).unwrap()).unwrap();

        assert!(xml.contains("<status_code>400</status_code>"));
        assert!(xml.contains("<request_id>req-1</request_id>"));
        assert!(xml.contains("<field name=\"Email Address\">Email Address is required</field>"));
        assert!(xml.contains("<field name=\"2fa\">2fa must be numeric</field>"));
    }

    #[test]
    fn test_xml_payload_keys_and_escaping() {
        let envelope = Envelope::with_data(json!({
            "1": "a",
            "user id": 7,
            "note": "a < b & \"c\"",
        }));
        let xml = String::from_utf8(render(&envelope, ResponseFormat::Xml).unwrap()).unwrap();

        assert!(xml.contains("<field name=\"1\">a</field>"));
        assert!(xml.contains("<field name=\"user id\">7</field>"));
        assert!(xml.contains("a &lt; b &amp; "));
        assert!(!xml.contains("a < b"));
    }

    #[test]
    fn test_xml_arrays_keep_their_nesting() {
        let render_data = |data: Value| {
            String::from_utf8(render(&Envelope::with_data(data), ResponseFormat::Xml).unwrap())
                .unwrap()
        };

        let flat = render_data(json!([1, 2, 3]));
        let nested = render_data(json!([[1, 2], [3]]));

        assert!(flat.contains("<data><item>1</item><item>2</item><item>3</item></data>"));
        assert!(nested.contains(
            "<data><item><item>1</item><item>2</item></item><item><item>3</item></item></data>"
        ));
        assert_ne!(flat, nested);

        let objects = render_data(json!({"tags": ["x", null], "empty": []}));
        assert!(objects.contains("<field name=\"empty\"></field>"));
        assert!(objects.contains("<field name=\"tags\"><item>x</item><item/></field>"));
    }

    #[test]
    fn test_content_types() {
        assert_eq!(ResponseFormat::Json.content_type(), "application/json");
        assert_eq!(ResponseFormat::Xml.content_type(), "application/xml");
    }
}
