//! XML-RPC wire codec: enough of the spec for Odoo's external API.

use quick_xml::events::{BytesDecl, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};

use crate::error::{OdooError, Result};

/// An XML-RPC value, request or response side.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int(i64),
    Bool(bool),
    Str(String),
    Double(f64),
    Array(Vec<Value>),
    Struct(Vec<(String, Value)>),
}

impl Value {
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn struct_get(&self, key: &str) -> Option<&Value> {
        match self {
            Value::Struct(members) => members.iter().find(|(k, _)| k == key).map(|(_, v)| v),
            _ => None,
        }
    }
}

fn enc<E: std::fmt::Display>(e: E) -> OdooError {
    OdooError::Protocol(format!("encode: {e}"))
}

fn proto(msg: &str) -> OdooError {
    OdooError::Protocol(msg.to_string())
}

fn write_text<W: std::io::Write>(wr: &mut Writer<W>, tag: &str, text: &str) -> Result<()> {
    wr.write_event(Event::Start(BytesStart::new(tag))).map_err(enc)?;
    wr.write_event(Event::Text(BytesText::new(text))).map_err(enc)?;
    wr.write_event(Event::End(BytesStart::new(tag).to_end()))
        .map_err(enc)?;
    Ok(())
}

fn write_value<W: std::io::Write>(wr: &mut Writer<W>, v: &Value) -> Result<()> {
    wr.write_event(Event::Start(BytesStart::new("value")))
        .map_err(enc)?;
    match v {
        Value::Int(i) => write_text(wr, "int", &i.to_string())?,
        Value::Bool(b) => write_text(wr, "boolean", if *b { "1" } else { "0" })?,
        Value::Str(s) => write_text(wr, "string", s)?,
        Value::Double(d) => write_text(wr, "double", &d.to_string())?,
        Value::Array(items) => {
            wr.write_event(Event::Start(BytesStart::new("array")))
                .map_err(enc)?;
            wr.write_event(Event::Start(BytesStart::new("data")))
                .map_err(enc)?;
            for item in items {
                write_value(wr, item)?;
            }
            wr.write_event(Event::End(BytesStart::new("data").to_end()))
                .map_err(enc)?;
            wr.write_event(Event::End(BytesStart::new("array").to_end()))
                .map_err(enc)?;
        }
        Value::Struct(members) => {
            wr.write_event(Event::Start(BytesStart::new("struct")))
                .map_err(enc)?;
            for (name, val) in members {
                wr.write_event(Event::Start(BytesStart::new("member")))
                    .map_err(enc)?;
                write_text(wr, "name", name)?;
                write_value(wr, val)?;
                wr.write_event(Event::End(BytesStart::new("member").to_end()))
                    .map_err(enc)?;
            }
            wr.write_event(Event::End(BytesStart::new("struct").to_end()))
                .map_err(enc)?;
        }
    }
    wr.write_event(Event::End(BytesStart::new("value").to_end()))
        .map_err(enc)?;
    Ok(())
}

/// Serialize one `<methodCall>` document.
pub fn encode_call(method: &str, params: &[Value]) -> Result<String> {
    let mut out = Vec::new();
    {
        let mut wr = Writer::new(&mut out);
        wr.write_event(Event::Decl(BytesDecl::new("1.0", None, None)))
            .map_err(enc)?;
        wr.write_event(Event::Start(BytesStart::new("methodCall")))
            .map_err(enc)?;
        write_text(&mut wr, "methodName", method)?;
        wr.write_event(Event::Start(BytesStart::new("params")))
            .map_err(enc)?;
        for p in params {
            wr.write_event(Event::Start(BytesStart::new("param")))
                .map_err(enc)?;
            write_value(&mut wr, p)?;
            wr.write_event(Event::End(BytesStart::new("param").to_end()))
                .map_err(enc)?;
        }
        wr.write_event(Event::End(BytesStart::new("params").to_end()))
            .map_err(enc)?;
        wr.write_event(Event::End(BytesStart::new("methodCall").to_end()))
            .map_err(enc)?;
    }
    String::from_utf8(out).map_err(enc)
}

#[derive(Clone, Copy)]
enum Scalar {
    Int,
    Bool,
    Str,
    Double,
}

enum Ctx {
    // A <value> awaiting its content.
    Value(Option<Value>),
    // Inside <array><data>.
    Array(Vec<Value>),
    // Inside <struct>; second field is the pending member name.
    Struct(Vec<(String, Value)>, Option<String>),
}

fn set_inner(stack: &mut [Ctx], v: Value) -> Result<()> {
    match stack.last_mut() {
        Some(Ctx::Value(inner @ None)) => {
            *inner = Some(v);
            Ok(())
        }
        _ => Err(proto("value content outside <value>")),
    }
}

fn close_value(stack: &mut Vec<Ctx>, result: &mut Option<Value>) -> Result<()> {
    let finished = match stack.pop() {
        // A <value> with no typed content is a (possibly empty) string.
        Some(Ctx::Value(inner)) => inner.unwrap_or_else(|| Value::Str(String::new())),
        _ => return Err(proto("misplaced </value>")),
    };
    match stack.last_mut() {
        Some(Ctx::Array(items)) => items.push(finished),
        Some(Ctx::Struct(members, name)) => {
            let name = name.take().ok_or_else(|| proto("struct member without a name"))?;
            members.push((name, finished));
        }
        Some(Ctx::Value(_)) => return Err(proto("nested <value> without a container")),
        None => *result = Some(finished),
    }
    Ok(())
}

/// Parse one `<methodResponse>` document into its single value.
///
/// A `<fault>` answer becomes [`OdooError::Fault`].
pub fn decode_response(body: &[u8]) -> Result<Value> {
    let mut reader = Reader::from_reader(body);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<Ctx> = Vec::new();
    let mut result: Option<Value> = None;
    let mut fault = false;
    let mut scalar: Option<Scalar> = None;
    let mut in_name = false;
    let mut buf = Vec::new();

    loop {
        let event = reader
            .read_event_into(&mut buf)
            .map_err(|e| OdooError::Protocol(format!("response XML: {e}")))?;
        match event {
            Event::Start(e) => match e.local_name().as_ref() {
                b"fault" => fault = true,
                b"value" => stack.push(Ctx::Value(None)),
                b"data" => stack.push(Ctx::Array(Vec::new())),
                b"struct" => stack.push(Ctx::Struct(Vec::new(), None)),
                b"name" => in_name = true,
                b"i4" | b"int" => scalar = Some(Scalar::Int),
                b"boolean" => scalar = Some(Scalar::Bool),
                b"string" | b"base64" | b"dateTime.iso8601" => scalar = Some(Scalar::Str),
                b"double" => scalar = Some(Scalar::Double),
                _ => {}
            },
            Event::Empty(e) => match e.local_name().as_ref() {
                b"string" | b"base64" => set_inner(&mut stack, Value::Str(String::new()))?,
                b"struct" => set_inner(&mut stack, Value::Struct(Vec::new()))?,
                b"array" | b"data" => set_inner(&mut stack, Value::Array(Vec::new()))?,
                b"value" => {
                    stack.push(Ctx::Value(None));
                    close_value(&mut stack, &mut result)?;
                }
                _ => {}
            },
            Event::Text(t) => {
                let text = t
                    .unescape()
                    .map_err(|e| OdooError::Protocol(format!("response XML: {e}")))?
                    .into_owned();
                if in_name {
                    match stack.last_mut() {
                        Some(Ctx::Struct(_, pending)) => *pending = Some(text),
                        _ => return Err(proto("<name> outside <struct>")),
                    }
                } else if let Some(kind) = scalar {
                    let parsed = match kind {
                        Scalar::Int => Value::Int(
                            text.trim()
                                .parse()
                                .map_err(|e| OdooError::Protocol(format!("bad int: {e}")))?,
                        ),
                        Scalar::Bool => {
                            let t = text.trim();
                            Value::Bool(t == "1" || t.eq_ignore_ascii_case("true"))
                        }
                        Scalar::Str => Value::Str(text),
                        Scalar::Double => Value::Double(
                            text.trim()
                                .parse()
                                .map_err(|e| OdooError::Protocol(format!("bad double: {e}")))?,
                        ),
                    };
                    set_inner(&mut stack, parsed)?;
                } else if matches!(stack.last(), Some(Ctx::Value(None))) {
                    // Untyped <value>text</value> is a string per the spec.
                    set_inner(&mut stack, Value::Str(text))?;
                }
            }
            Event::End(e) => match e.local_name().as_ref() {
                b"name" => in_name = false,
                b"i4" | b"int" | b"boolean" | b"string" | b"double" | b"base64"
                | b"dateTime.iso8601" => {
                    // <string></string> produces no text event at all.
                    if matches!(scalar, Some(Scalar::Str))
                        && matches!(stack.last(), Some(Ctx::Value(None)))
                    {
                        set_inner(&mut stack, Value::Str(String::new()))?;
                    }
                    scalar = None;
                }
                b"data" => {
                    let items = match stack.pop() {
                        Some(Ctx::Array(items)) => items,
                        _ => return Err(proto("misplaced </data>")),
                    };
                    set_inner(&mut stack, Value::Array(items))?;
                }
                b"struct" => {
                    let members = match stack.pop() {
                        Some(Ctx::Struct(members, _)) => members,
                        _ => return Err(proto("misplaced </struct>")),
                    };
                    set_inner(&mut stack, Value::Struct(members))?;
                }
                b"value" => close_value(&mut stack, &mut result)?,
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    let value = result.ok_or_else(|| proto("response contained no value"))?;
    if fault {
        let code = value.struct_get("faultCode").and_then(Value::as_i64).unwrap_or(0);
        let message = match value.struct_get("faultString") {
            Some(Value::Str(s)) => s.clone(),
            _ => String::new(),
        };
        return Err(OdooError::Fault { code, message });
    }
    Ok(value)
}
