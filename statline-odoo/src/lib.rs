//! statline-odoo: minimal XML-RPC client for Odoo's external API.
//!
//! Covers the three calls the statement pipeline needs: authenticate,
//! search bank statements by name, and create + trigger an import-staging
//! record. Everything else Odoo offers is out of scope.

pub mod client;
pub mod error;
pub mod xmlrpc;

pub use client::{OdooClient, OdooLedger, OdooSession, StatementLedger, UploadRecord};
pub use error::{OdooError, Result};
