//! Single-pass inspection of a CAMT.053 document.
//!
//! Only elements bound to the camt.053.001.04 namespace are considered, so a
//! well-formed XML file from some other schema simply inspects as blank.

use quick_xml::events::Event;
use quick_xml::name::{Namespace, ResolveResult};
use quick_xml::reader::NsReader;
use thiserror::Error;

/// Namespace the PostFinance exports declare.
pub const CAMT053_NS: &str = "urn:iso:std:iso:20022:tech:xsd:camt.053.001.04";

#[derive(Debug, Error)]
pub enum InspectError {
    #[error("XML error: {0}")]
    Xml(String),
}

/// What one pass over the document found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inspection {
    /// Number of `Ntry` transaction entries.
    pub entry_count: usize,
    /// Trimmed text of the first `Id` directly under a `Stmt`, if any.
    pub statement_id: Option<String>,
}

impl Inspection {
    /// A statement with no transaction entries is blank.
    pub fn is_blank(&self) -> bool {
        self.entry_count == 0
    }
}

fn in_camt_ns(resolved: &ResolveResult) -> bool {
    matches!(resolved, ResolveResult::Bound(Namespace(ns)) if *ns == CAMT053_NS.as_bytes())
}

/// Scan `xml` once, counting entries and capturing the statement id.
pub fn inspect(xml: &[u8]) -> Result<Inspection, InspectError> {
    let mut reader = NsReader::from_reader(xml);
    reader.config_mut().trim_text(true);

    let mut buf = Vec::new();
    let mut entry_count = 0usize;
    let mut statement_id: Option<String> = None;

    // Depth below the enclosing <Stmt>; the statement id is the first <Id>
    // that is a direct child (depth 1), not Acct/Id or anything deeper.
    let mut stmt_depth = 0usize;
    let mut in_stmt_id = false;
    let mut saw_root = false;

    loop {
        match reader.read_resolved_event_into(&mut buf) {
            Ok((resolved, Event::Start(e))) => {
                saw_root = true;
                let camt = in_camt_ns(&resolved);
                if camt && e.local_name().as_ref() == b"Ntry" {
                    entry_count += 1;
                }
                if stmt_depth > 0 {
                    stmt_depth += 1;
                    if stmt_depth == 2
                        && camt
                        && e.local_name().as_ref() == b"Id"
                        && statement_id.is_none()
                    {
                        in_stmt_id = true;
                    }
                } else if camt && e.local_name().as_ref() == b"Stmt" {
                    stmt_depth = 1;
                }
            }
            Ok((resolved, Event::Empty(e))) => {
                saw_root = true;
                if in_camt_ns(&resolved) && e.local_name().as_ref() == b"Ntry" {
                    entry_count += 1;
                }
            }
            Ok((_, Event::Text(t))) => {
                if in_stmt_id {
                    let text = t.unescape().map_err(|e| InspectError::Xml(e.to_string()))?;
                    let trimmed = text.trim();
                    if !trimmed.is_empty() {
                        statement_id = Some(trimmed.to_string());
                    }
                }
            }
            Ok((_, Event::End(_))) => {
                in_stmt_id = false;
                if stmt_depth > 0 {
                    stmt_depth -= 1;
                }
            }
            Ok((_, Event::Eof)) => break,
            Err(e) => return Err(InspectError::Xml(e.to_string())),
            Ok(_) => {}
        }
        buf.clear();
    }

    if !saw_root {
        return Err(InspectError::Xml("document contains no elements".into()));
    }

    Ok(Inspection {
        entry_count,
        statement_id,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn camt_doc(stmt_inner: &str) -> String {
        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<Document xmlns="{CAMT053_NS}">
  <BkToCstmrStmt>
    <GrpHdr><MsgId>MSG-1</MsgId></GrpHdr>
    <Stmt>
{stmt_inner}
    </Stmt>
  </BkToCstmrStmt>
</Document>"#
        )
    }

    const ENTRY: &str = r#"<Ntry><Amt Ccy="CHF">12.50</Amt><CdtDbtInd>CRDT</CdtDbtInd></Ntry>"#;

    #[test]
    fn blank_statement_has_no_entries() {
        let doc = camt_doc("<Id>20250301-CH93-1</Id><Acct><Id><IBAN>CH9300762011623852957</IBAN></Id></Acct>");
        let got = inspect(doc.as_bytes()).unwrap();
        assert!(got.is_blank());
        assert_eq!(got.statement_id.as_deref(), Some("20250301-CH93-1"));
    }

    #[test]
    fn entries_make_the_statement_non_blank() {
        let doc = camt_doc(&format!("<Id>STMT-001</Id>{ENTRY}{ENTRY}"));
        let got = inspect(doc.as_bytes()).unwrap();
        assert!(!got.is_blank());
        assert_eq!(got.entry_count, 2);
    }

    #[test]
    fn entries_outside_the_camt_namespace_do_not_count() {
        let doc = format!(
            r#"<Document xmlns="{CAMT053_NS}" xmlns:x="urn:example:other">
  <BkToCstmrStmt><Stmt><Id>STMT-002</Id><x:Ntry/></Stmt></BkToCstmrStmt>
</Document>"#
        );
        let got = inspect(doc.as_bytes()).unwrap();
        assert!(got.is_blank());
    }

    #[test]
    fn self_closing_entry_counts() {
        let doc = camt_doc("<Id>STMT-003</Id><Ntry/>");
        assert_eq!(inspect(doc.as_bytes()).unwrap().entry_count, 1);
    }

    #[test]
    fn missing_id_yields_none() {
        let doc = camt_doc(ENTRY);
        assert_eq!(inspect(doc.as_bytes()).unwrap().statement_id, None);
    }

    #[test]
    fn whitespace_only_id_yields_none() {
        let doc = camt_doc("<Id>   </Id>");
        assert_eq!(inspect(doc.as_bytes()).unwrap().statement_id, None);
    }

    #[test]
    fn id_text_is_trimmed() {
        let doc = camt_doc("<Id>  STMT-004\n  </Id>");
        assert_eq!(
            inspect(doc.as_bytes()).unwrap().statement_id.as_deref(),
            Some("STMT-004")
        );
    }

    #[test]
    fn account_id_is_not_the_statement_id() {
        // Acct/Id/IBAN nests one level deeper than Stmt/Id.
        let doc = camt_doc("<Acct><Id><IBAN>CH9300762011623852957</IBAN></Id></Acct>");
        assert_eq!(inspect(doc.as_bytes()).unwrap().statement_id, None);
    }

    #[test]
    fn first_statement_id_wins() {
        let doc = format!(
            r#"<Document xmlns="{CAMT053_NS}"><BkToCstmrStmt>
  <Stmt><Id>FIRST</Id></Stmt>
  <Stmt><Id>SECOND</Id></Stmt>
</BkToCstmrStmt></Document>"#
        );
        assert_eq!(
            inspect(doc.as_bytes()).unwrap().statement_id.as_deref(),
            Some("FIRST")
        );
    }

    #[test]
    fn mismatched_tags_are_a_parse_error() {
        let doc = format!(r#"<Document xmlns="{CAMT053_NS}"><Stmt></Document>"#);
        assert!(inspect(doc.as_bytes()).is_err());
    }

    #[test]
    fn plain_text_is_a_parse_error() {
        assert!(inspect(b"this is not a statement").is_err());
    }

    #[test]
    fn empty_input_is_a_parse_error() {
        assert!(inspect(b"").is_err());
    }
}
