//! Single-field edits to a [`SchemeInfo`].
//!
//! A [`Mutation`] is applied to a copy of the record; the copy is validated as
//! a whole before it replaces the original, so a rejected edit never reaches
//! disk.
//!
//! For `description`, `derivedfrom`, `license` and `contactinfo` the literal
//! value `None` clears the field. A genuine value spelled `None` therefore
//! cannot be stored.
use core::fmt;

use crate::error::SchemeError;
use crate::schema::{Collection, LinkField, PrimerClass, SchemeInfo, SchemeStatus};

/// Text that clears an optional string field.
pub const CLEAR_VALUE: &str = "None";

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Mutation {
    /// Insert at `position` (0-based) or append
    AddAuthor { author: String, position: Option<usize> },
    RemoveAuthor(String),
    /// Listed indices first, the rest appended in their original order
    ReorderAuthors(Vec<usize>),
    AddCitation(String),
    RemoveCitation(String),
    AddCollection(Collection),
    RemoveCollection(Collection),
    ChangeDescription(String),
    ChangeDerivedFrom(String),
    ChangeLicense(String),
    ChangeStatus(SchemeStatus),
    ChangePrimerClass(PrimerClass),
    ChangeContactInfo(String),
    AddLink { field: LinkField, url: String },
    RemoveLink { field: LinkField, url: String },
}

impl fmt::Display for Mutation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mutation::AddAuthor { author, .. } => write!(f, "add author '{author}'"),
            Mutation::RemoveAuthor(a) => write!(f, "remove author '{a}'"),
            Mutation::ReorderAuthors(order) => write!(f, "reorder authors {order:?}"),
            Mutation::AddCitation(c) => write!(f, "add citation '{c}'"),
            Mutation::RemoveCitation(c) => write!(f, "remove citation '{c}'"),
            Mutation::AddCollection(c) => write!(f, "add collection {c}"),
            Mutation::RemoveCollection(c) => write!(f, "remove collection {c}"),
            Mutation::ChangeDescription(_) => write!(f, "change description"),
            Mutation::ChangeDerivedFrom(d) => write!(f, "change derivedfrom to '{d}'"),
            Mutation::ChangeLicense(l) => write!(f, "change license to '{l}'"),
            Mutation::ChangeStatus(s) => write!(f, "change status to {s}"),
            Mutation::ChangePrimerClass(p) => write!(f, "change primerclass to {p}"),
            Mutation::ChangeContactInfo(_) => write!(f, "change contactinfo"),
            Mutation::AddLink { url, .. } => write!(f, "add link {url}"),
            Mutation::RemoveLink { url, .. } => write!(f, "remove link {url}"),
        }
    }
}

impl Mutation {
    /// Apply to a copy of `info` and return it once the whole record validates.
    pub fn apply(&self, info: &SchemeInfo) -> Result<SchemeInfo, SchemeError> {
        let mut next = info.clone();
        let id = info.identity().to_string();
        let invalid = |message: String| SchemeError::invalid(&id, message);

        match self {
            Mutation::AddAuthor { author, position } => {
                if next.authors.contains(author) {
                    return Err(invalid(format!("author '{author}' is already listed")));
                }
                match position {
                    Some(p) if *p > next.authors.len() => {
                        return Err(invalid(format!(
                            "author position {p} is out of range for {} authors",
                            next.authors.len()
                        )));
                    }
                    Some(p) => next.authors.insert(*p, author.clone()),
                    None => next.authors.push(author.clone()),
                }
            }
            Mutation::RemoveAuthor(author) => {
                let idx = next
                    .authors
                    .iter()
                    .position(|a| a == author)
                    .ok_or_else(|| invalid(format!("author '{author}' is not listed")))?;
                next.authors.remove(idx);
            }
            Mutation::ReorderAuthors(order) => {
                next.authors = reorder(&next.authors, order).map_err(invalid)?;
            }
            Mutation::AddCitation(citation) => {
                if next.citations.contains(citation) {
                    return Err(invalid(format!("citation '{citation}' is already listed")));
                }
                next.citations.push(citation.clone());
            }
            Mutation::RemoveCitation(citation) => {
                let before = next.citations.len();
                next.citations.retain(|c| c != citation);
                if next.citations.len() == before {
                    return Err(invalid(format!("citation '{citation}' is not listed")));
                }
            }
            Mutation::AddCollection(c) => {
                next.collections.insert(*c);
            }
            Mutation::RemoveCollection(c) => {
                if !next.collections.remove(c) {
                    return Err(invalid(format!("collection {c} is not listed")));
                }
            }
            Mutation::ChangeDescription(v) => next.description = optional(v),
            Mutation::ChangeDerivedFrom(v) => next.derivedfrom = optional(v),
            Mutation::ChangeLicense(v) => next.license = optional(v),
            Mutation::ChangeContactInfo(v) => next.contactinfo = optional(v),
            Mutation::ChangeStatus(s) => next.status = *s,
            Mutation::ChangePrimerClass(p) => next.primerclass = *p,
            Mutation::AddLink { field, url } => {
                let urls = next.links.field_mut(*field);
                if urls.contains(url) {
                    return Err(invalid(format!("link '{url}' is already listed")));
                }
                urls.push(url.clone());
            }
            Mutation::RemoveLink { field, url } => {
                let urls = next.links.field_mut(*field);
                let idx = urls
                    .iter()
                    .position(|u| u == url)
                    .ok_or_else(|| invalid(format!("link '{url}' is not listed")))?;
                urls.remove(idx);
            }
        }

        next.validate()?;
        Ok(next)
    }
}

fn optional(value: &str) -> Option<String> {
    if value == CLEAR_VALUE {
        None
    } else {
        Some(value.to_string())
    }
}

/// Move the items at `order` to the front, keeping the remainder in their
/// original relative order.
fn reorder(items: &[String], order: &[usize]) -> Result<Vec<String>, String> {
    let mut taken = vec![false; items.len()];
    let mut out = Vec::with_capacity(items.len());
    for &i in order {
        match taken.get_mut(i) {
            None => return Err(format!("author index {i} is out of range for {} authors", items.len())),
            Some(true) => return Err(format!("author index {i} is listed more than once")),
            Some(t) => {
                *t = true;
                out.push(items[i].clone());
            }
        }
    }
    out.extend(items.iter().zip(taken).filter(|(_, t)| !t).map(|(a, _)| a.clone()));
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::tests::example_info;

    fn with_authors(authors: &[&str]) -> SchemeInfo {
        let mut info = example_info();
        info.authors = authors.iter().map(|a| a.to_string()).collect();
        info
    }

    #[test]
    fn add_then_remove_author_restores_list() {
        let info = with_authors(&["a", "b", "c"]);
        let added = Mutation::AddAuthor { author: "d".into(), position: Some(1) }.apply(&info).unwrap();
        assert_eq!(added.authors, ["a", "d", "b", "c"]);
        let removed = Mutation::RemoveAuthor("d".into()).apply(&added).unwrap();
        assert_eq!(removed.authors, info.authors);
    }

    #[test]
    fn author_edits_reject_bad_input() {
        let info = with_authors(&["a", "b"]);
        assert!(Mutation::AddAuthor { author: "a".into(), position: None }.apply(&info).is_err());
        assert!(Mutation::AddAuthor { author: "z".into(), position: Some(3) }.apply(&info).is_err());
        assert!(Mutation::RemoveAuthor("z".into()).apply(&info).is_err());

        // removing the last author leaves an invalid record
        let single = with_authors(&["a"]);
        assert!(Mutation::RemoveAuthor("a".into()).apply(&single).is_err());
    }

    #[test]
    fn partial_reorder_appends_remainder() {
        let info = with_authors(&["a", "b", "c"]);
        let out = Mutation::ReorderAuthors(vec![1]).apply(&info).unwrap();
        assert_eq!(out.authors, ["b", "a", "c"]);

        let out = Mutation::ReorderAuthors(vec![2, 0]).apply(&info).unwrap();
        assert_eq!(out.authors, ["c", "a", "b"]);

        assert!(Mutation::ReorderAuthors(vec![1, 1]).apply(&info).is_err());
        assert!(Mutation::ReorderAuthors(vec![3]).apply(&info).is_err());
    }

    #[test]
    fn none_clears_optional_fields() {
        let info = example_info();
        let set = Mutation::ChangeDescription("A tiled amplicon scheme".into()).apply(&info).unwrap();
        assert_eq!(set.description.as_deref(), Some("A tiled amplicon scheme"));
        let cleared = Mutation::ChangeDescription(CLEAR_VALUE.into()).apply(&set).unwrap();
        assert_eq!(cleared.description, None);

        let cleared = Mutation::ChangeLicense(CLEAR_VALUE.into()).apply(&info).unwrap();
        assert_eq!(cleared.license, None);
    }

    #[test]
    fn collections_and_citations() {
        let info = example_info();
        let out = Mutation::AddCollection(Collection::Artic).apply(&info).unwrap();
        let again = Mutation::AddCollection(Collection::Artic).apply(&out).unwrap();
        assert_eq!(out, again);
        assert!(Mutation::RemoveCollection(Collection::Panel).apply(&out).is_err());

        let cited = Mutation::AddCitation("doi:10.1/x".into()).apply(&info).unwrap();
        assert!(Mutation::AddCitation("doi:10.1/x".into()).apply(&cited).is_err());
        assert_eq!(Mutation::RemoveCitation("doi:10.1/x".into()).apply(&cited).unwrap(), info);
    }

    #[test]
    fn links() {
        let info = example_info();
        let add = Mutation::AddLink { field: LinkField::Protocols, url: "https://protocols.io/x".into() };
        let out = add.apply(&info).unwrap();
        assert_eq!(out.links.protocols, ["https://protocols.io/x"]);
        assert!(add.apply(&out).is_err());

        let remove = Mutation::RemoveLink { field: LinkField::Protocols, url: "https://protocols.io/x".into() };
        assert_eq!(remove.apply(&out).unwrap(), info);
        assert!(remove.apply(&info).is_err());
    }
}
