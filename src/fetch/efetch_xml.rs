//! Parsing of PubMed efetch XML into [`RawRecord`]s.
//!
//! Only the fields the trend analysis needs are read: the citation PMID,
//! `Journal/JournalIssue/PubDate/Year` as raw text, and each
//! `MeshHeading/DescriptorName`. Everything else is skipped.

use quick_xml::Reader;
use quick_xml::events::Event;
use thiserror::Error;

use crate::trends::RawRecord;

/// Failure while reading an efetch response body.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EfetchParseError {
    /// The body is not well-formed XML.
    #[error("malformed efetch XML: {0}")]
    Xml(String),
    /// The service returned an `<ERROR>` element instead of articles.
    #[error("{0}")]
    Service(String),
}

fn xml_error(error: impl std::fmt::Display) -> EfetchParseError {
    EfetchParseError::Xml(error.to_string())
}

type XmlReader<'a> = Reader<&'a [u8]>;

/// Parses a `PubmedArticleSet` document.
///
/// Book articles and other non-`PubmedArticle` entries are ignored.
///
/// # Errors
///
/// Returns [`EfetchParseError`] on malformed XML or a service error element.
pub fn parse_efetch_xml(xml: &str) -> Result<Vec<RawRecord>, EfetchParseError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut records = Vec::new();
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf).map_err(xml_error)? {
            Event::Start(e) => match e.name().as_ref() {
                b"PubmedArticle" => records.push(parse_article(&mut reader)?),
                b"ERROR" => {
                    let message = read_text(&mut reader)?;
                    return Err(EfetchParseError::Service(message.trim().to_string()));
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(records)
}

fn parse_article(reader: &mut XmlReader<'_>) -> Result<RawRecord, EfetchParseError> {
    let mut record = RawRecord::default();
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf).map_err(xml_error)? {
            Event::Start(e) if e.name().as_ref() == b"MedlineCitation" => {
                parse_medline_citation(reader, &mut record)?;
            }
            Event::End(e) if e.name().as_ref() == b"PubmedArticle" => break,
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(record)
}

fn parse_medline_citation(
    reader: &mut XmlReader<'_>,
    record: &mut RawRecord,
) -> Result<(), EfetchParseError> {
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf).map_err(xml_error)? {
            Event::Start(e) => match e.name().as_ref() {
                // Nested lists (e.g. CommentsCorrections) carry their own PMIDs.
                b"PMID" if record.pmid.is_empty() => record.pmid = read_text(reader)?,
                b"Article" => parse_article_element(reader, record)?,
                b"MeshHeadingList" => record.keywords = parse_mesh_list(reader)?,
                _ => {}
            },
            Event::End(e) if e.name().as_ref() == b"MedlineCitation" => break,
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(())
}

fn parse_article_element(
    reader: &mut XmlReader<'_>,
    record: &mut RawRecord,
) -> Result<(), EfetchParseError> {
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf).map_err(xml_error)? {
            Event::Start(e) if e.name().as_ref() == b"PubDate" => {
                record.year = parse_pub_date_year(reader)?;
            }
            Event::End(e) if e.name().as_ref() == b"Article" => break,
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(())
}

fn parse_pub_date_year(reader: &mut XmlReader<'_>) -> Result<Option<String>, EfetchParseError> {
    let mut year = None;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf).map_err(xml_error)? {
            Event::Start(e) if e.name().as_ref() == b"Year" => {
                year = Some(read_text(reader)?.trim().to_string());
            }
            Event::End(e) if e.name().as_ref() == b"PubDate" => break,
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(year)
}

fn parse_mesh_list(reader: &mut XmlReader<'_>) -> Result<Vec<String>, EfetchParseError> {
    let mut descriptors = Vec::new();
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf).map_err(xml_error)? {
            Event::Start(e) if e.name().as_ref() == b"DescriptorName" => {
                let descriptor = read_text(reader)?.trim().to_string();
                if !descriptor.is_empty() {
                    descriptors.push(descriptor);
                }
            }
            Event::End(e) if e.name().as_ref() == b"MeshHeadingList" => break,
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(descriptors)
}

/// Reads the text of the current element, flattening inline markup.
fn read_text(reader: &mut XmlReader<'_>) -> Result<String, EfetchParseError> {
    let mut buf = Vec::new();
    let mut text = String::new();

    loop {
        match reader.read_event_into(&mut buf).map_err(xml_error)? {
            Event::Text(e) => text.push_str(&e.unescape().map_err(xml_error)?),
            Event::Start(_) => text.push_str(&read_text(reader)?),
            Event::End(_) | Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(text)
}
