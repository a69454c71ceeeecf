//! Links: directed edges from an `out` port to an `in` port.

use std::fmt;

use uuid::Uuid;

use super::port::PortRef;

/// Link identity. Authority-assigned once persisted, a local placeholder until then.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LinkId {
    Confirmed(String),
    Provisional(Uuid),
}

impl LinkId {
    pub fn confirmed(id: impl Into<String>) -> Self {
        LinkId::Confirmed(id.into())
    }

    pub fn provisional() -> Self {
        LinkId::Provisional(Uuid::new_v4())
    }

    pub fn is_provisional(&self) -> bool {
        matches!(self, LinkId::Provisional(_))
    }

    /// The id the authority knows this link by, if any.
    pub fn authority_id(&self) -> Option<&str> {
        match self {
            LinkId::Confirmed(id) => Some(id),
            LinkId::Provisional(_) => None,
        }
    }
}

impl fmt::Display for LinkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkId::Confirmed(id) => f.write_str(id),
            LinkId::Provisional(id) => write!(f, "provisional-{}", id),
        }
    }
}

/// Which end of a link an operation targets.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LinkEnd {
    Source,
    Target,
}

impl LinkEnd {
    pub fn opposite(self) -> Self {
        match self {
            LinkEnd::Source => LinkEnd::Target,
            LinkEnd::Target => LinkEnd::Source,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Link {
    pub id: LinkId,
    source: Option<PortRef>,
    target: Option<PortRef>,
    /// Structural links (layer chains) that users cannot delete.
    implicit: bool,
    labels: Vec<String>,
    /// Set once the creation request for a provisional link has been sent.
    announced: bool,
}

impl Link {
    /// A user-drawn link with no endpoints yet.
    pub fn provisional() -> Self {
        Self {
            id: LinkId::provisional(),
            source: None,
            target: None,
            implicit: false,
            labels: Vec::new(),
            announced: false,
        }
    }

    /// A link the authority already knows about.
    pub fn confirmed(id: &str, source: PortRef, target: PortRef, implicit: bool) -> Self {
        Self {
            id: LinkId::confirmed(id),
            source: Some(source),
            target: Some(target),
            implicit,
            labels: Vec::new(),
            announced: true,
        }
    }

    pub fn source(&self) -> Option<&PortRef> {
        self.source.as_ref()
    }

    pub fn target(&self) -> Option<&PortRef> {
        self.target.as_ref()
    }

    pub fn end(&self, end: LinkEnd) -> Option<&PortRef> {
        match end {
            LinkEnd::Source => self.source.as_ref(),
            LinkEnd::Target => self.target.as_ref(),
        }
    }

    pub(crate) fn set_end(&mut self, end: LinkEnd, port: Option<PortRef>) {
        match end {
            LinkEnd::Source => self.source = port,
            LinkEnd::Target => self.target = port,
        }
    }

    /// Both attached ports, in whatever order they were set.
    pub fn ends(&self) -> impl Iterator<Item = &PortRef> {
        self.source.iter().chain(self.target.iter())
    }

    pub fn is_implicit(&self) -> bool {
        self.implicit
    }

    pub fn is_provisional(&self) -> bool {
        self.id.is_provisional()
    }

    pub fn is_announced(&self) -> bool {
        self.announced
    }

    pub(crate) fn mark_announced(&mut self) {
        self.announced = true;
    }

    pub(crate) fn confirm(&mut self, id: &str) {
        self.id = LinkId::confirmed(id);
        self.announced = true;
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// Replace all labels with exactly one.
    pub(crate) fn set_label(&mut self, label: &str) {
        self.labels.clear();
        self.labels.push(label.to_string());
    }

    pub(crate) fn clear_labels(&mut self) {
        self.labels.clear();
    }
}
