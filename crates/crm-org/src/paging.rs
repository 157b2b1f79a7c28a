//! Paging cookies.
//!
//! FetchXML aggregate and link-entity queries often come back with
//! `MoreRecords` set but no paging cookie. The server still honors plain
//! page numbers, so the driver synthesizes a minimal cookie carrying one.

use xmltree::Element;

use crm_soap_client::{Error, Result};

/// Read the page number from a paging cookie.
pub fn page_number(cookie: &str) -> Result<u32> {
    let doc = Element::parse(cookie.as_bytes())
        .map_err(|_| Error::structural(format!("Invalid paging cookie: {cookie}")))?;
    doc.attributes
        .get("page")
        .and_then(|p| p.parse().ok())
        .ok_or_else(|| Error::structural(format!("Could not find page attribute in paging cookie: {cookie}")))
}

/// Synthesize the cookie for the page after `prior`, or for page 1 when
/// there is no prior cookie.
pub fn next_cookie(prior: Option<&str>) -> Result<String> {
    let page = match prior {
        None => 1,
        Some(cookie) => page_number(cookie)? + 1,
    };
    Ok(format!("<cookie page=\"{page}\"></cookie>"))
}
