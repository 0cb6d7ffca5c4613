//! File-context lists.
//!
//! A file_contexts file labels path patterns with a security context, one
//! entry per line:
//!
//! ```text
//! /var/log/httpd(/.*)?    --    system_u:object_r:httpd_log_t:s0
//! /home/[^/]+             -d    <<none>>
//! ```
//!
//! The optional middle column restricts the entry to one object class.

use polscope_core::error::{ConstructionError, Result};
use polscope_core::PolicyAccessor;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use tracing::debug;

use super::range::MlsRange;

/// The object class an entry applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileClass {
    All,
    File,
    Dir,
    ChrFile,
    BlkFile,
    LnkFile,
    SockFile,
    FifoFile,
}

impl FileClass {
    /// Parse a class flag such as `--` or `-d`.
    pub fn from_flag(flag: &str) -> Option<Self> {
        Some(match flag {
            "--" => Self::File,
            "-d" => Self::Dir,
            "-c" => Self::ChrFile,
            "-b" => Self::BlkFile,
            "-l" => Self::LnkFile,
            "-s" => Self::SockFile,
            "-p" => Self::FifoFile,
            _ => return None,
        })
    }

    /// Get the flag written in file_contexts files.
    pub fn flag(&self) -> &'static str {
        match self {
            Self::All => "  ",
            Self::File => "--",
            Self::Dir => "-d",
            Self::ChrFile => "-c",
            Self::BlkFile => "-b",
            Self::LnkFile => "-l",
            Self::SockFile => "-s",
            Self::FifoFile => "-p",
        }
    }

    /// Get the policy class name, or `None` for an unrestricted entry.
    pub fn class_name(&self) -> Option<&'static str> {
        match self {
            Self::All => None,
            Self::File => Some("file"),
            Self::Dir => Some("dir"),
            Self::ChrFile => Some("chr_file"),
            Self::BlkFile => Some("blk_file"),
            Self::LnkFile => Some("lnk_file"),
            Self::SockFile => Some("sock_file"),
            Self::FifoFile => Some("fifo_file"),
        }
    }
}

/// The security context of an entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FcContext {
    pub user: String,
    pub role: String,
    pub type_name: String,
    pub range: Option<String>,
}

impl fmt::Display for FcContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.user, self.role, self.type_name)?;
        if let Some(range) = &self.range {
            write!(f, ":{}", range)?;
        }
        Ok(())
    }
}

/// One file_contexts entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FcEntry {
    /// The path regular expression.
    pub path: String,

    /// The object class restriction.
    pub class: FileClass,

    /// The context, or `None` for `<<none>>`.
    pub context: Option<FcContext>,

    /// The 1-based line the entry was read from.
    pub line: usize,
}

impl FcEntry {
    /// Get the entry's range, bound against a policy.
    ///
    /// # Returns
    ///
    /// * `Ok(Some(MlsRange))` - The bound range.
    /// * `Ok(None)` - The entry has no range.
    /// * `Err` - If the range does not resolve in the policy.
    pub fn range(&self, accessor: &dyn PolicyAccessor) -> Result<Option<MlsRange>> {
        match self.context.as_ref().and_then(|c| c.range.as_deref()) {
            Some(literal) => Ok(Some(MlsRange::parse(accessor, literal)?)),
            None => Ok(None),
        }
    }
}

impl fmt::Display for FcEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.context {
            Some(context) => write!(f, "{}\t{}\t{}", self.path, self.class.flag(), context),
            None => write!(f, "{}\t{}\t<<none>>", self.path, self.class.flag()),
        }
    }
}

/// A parsed file_contexts file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileContextList {
    entries: Vec<FcEntry>,
    mls: bool,
}

impl FileContextList {
    /// Parse file_contexts text.
    ///
    /// Every context must either carry a range or not; mixing the two is
    /// an error.
    ///
    /// # Returns
    ///
    /// * `Ok(FileContextList)` - The parsed entries in file order.
    /// * `Err` - `ConstructionError::MalformedFileContext` naming the first
    ///   bad line.
    pub fn parse(text: &str) -> Result<Self> {
        let mut entries = Vec::new();
        let mut mls: Option<bool> = None;

        for (index, raw) in text.lines().enumerate() {
            let line = index + 1;
            let trimmed = raw.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            let entry = parse_line(trimmed, line)?;

            if let Some(context) = &entry.context {
                let has_range = context.range.is_some();
                match mls {
                    Some(expected) if expected != has_range => {
                        return Err(malformed(
                            line,
                            if expected {
                                "context has no range, but earlier contexts do"
                            } else {
                                "context has a range, but earlier contexts do not"
                            },
                        ))
                    }
                    _ => mls = Some(has_range),
                }
            }
            entries.push(entry);
        }

        debug!(entries = entries.len(), "parsed file contexts");
        Ok(Self {
            entries,
            mls: mls.unwrap_or(false),
        })
    }

    /// Read and parse a file_contexts file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::parse(&text)
    }

    /// Get the entries.
    pub fn entries(&self) -> &[FcEntry] {
        &self.entries
    }

    /// Get an entry by position.
    pub fn get(&self, index: usize) -> Option<&FcEntry> {
        self.entries.get(index)
    }

    /// Get the number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check whether the list has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Check whether the contexts carry MLS ranges.
    pub fn is_mls(&self) -> bool {
        self.mls
    }
}

fn malformed(line: usize, reason: &str) -> polscope_core::Error {
    ConstructionError::MalformedFileContext {
        line,
        reason: reason.to_string(),
    }
    .into()
}

fn parse_line(text: &str, line: usize) -> Result<FcEntry> {
    let mut fields = text.split_whitespace();
    let path = fields
        .next()
        .ok_or_else(|| malformed(line, "expected a path and a context"))?;
    let rest: Vec<&str> = fields.collect();

    let (class, context) = match rest.split_first() {
        Some((flag, tail)) if flag.len() == 2 && flag.starts_with('-') => {
            let class = FileClass::from_flag(flag)
                .ok_or_else(|| malformed(line, &format!("unknown object class flag {}", flag)))?;
            (class, tail.join(" "))
        }
        // A range may contain spaces around its dash.
        _ => (FileClass::All, rest.join(" ")),
    };

    let context = match context.as_str() {
        "" => return Err(malformed(line, "expected a path and a context")),
        "<<none>>" => None,
        text => Some(parse_context(text, line)?),
    };
    Ok(FcEntry {
        path: path.to_string(),
        class,
        context,
        line,
    })
}

fn parse_context(text: &str, line: usize) -> Result<FcContext> {
    let parts: Vec<&str> = text.splitn(4, ':').collect();
    if parts.len() < 3 || parts.iter().any(|p| p.trim().is_empty()) {
        return Err(malformed(line, &format!("context {} is not user:role:type[:range]", text)));
    }
    Ok(FcContext {
        user: parts[0].to_string(),
        role: parts[1].to_string(),
        type_name: parts[2].to_string(),
        range: parts.get(3).map(|r| r.trim().to_string()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::test_fixtures::mls_policy;
    use polscope_core::Error;

    const FC: &str = "\
# web server
/var/www(/.*)?\t\tsystem_u:object_r:httpd_sys_content_t:s0
/var/log/httpd(/.*)?\t--\tsystem_u:object_r:httpd_log_t:s0 - s1:c0.c3

/home/[^/]+\t-d\t<<none>>
/usr/sbin/httpd\t--\tsystem_u:object_r:httpd_exec_t:s0
";

    #[test]
    fn test_parse_entries() {
        let list = FileContextList::parse(FC).unwrap();
        assert_eq!(list.len(), 4);
        assert!(list.is_mls());

        let www = &list.entries()[0];
        assert_eq!(www.class, FileClass::All);
        assert_eq!(www.line, 2);
        assert_eq!(www.context.as_ref().unwrap().type_name, "httpd_sys_content_t");

        let log = &list.entries()[1];
        assert_eq!(log.class, FileClass::File);
        assert_eq!(log.context.as_ref().unwrap().range.as_deref(), Some("s0 - s1:c0.c3"));

        let home = &list.entries()[2];
        assert_eq!(home.class, FileClass::Dir);
        assert!(home.context.is_none());
        assert_eq!(home.to_string(), "/home/[^/]+\t-d\t<<none>>");
    }

    #[test]
    fn test_entry_range_binds_lazily() {
        let policy = mls_policy();
        let list = FileContextList::parse(FC).unwrap();
        let range = list.entries()[1].range(&policy).unwrap().unwrap();
        assert_eq!(range.render(&policy).unwrap(), "s0 - s1:c0.c3");
        assert!(list.entries()[2].range(&policy).unwrap().is_none());
    }

    #[test]
    fn test_bad_flag() {
        let err = FileContextList::parse("/a\t-x\tu:r:t").unwrap_err();
        assert!(matches!(
            err,
            Error::Construction(ConstructionError::MalformedFileContext { line: 1, .. })
        ));
    }

    #[test]
    fn test_bad_context() {
        let err = FileContextList::parse("# header\n/a\tu:r").unwrap_err();
        assert!(matches!(
            err,
            Error::Construction(ConstructionError::MalformedFileContext { line: 2, .. })
        ));
        assert!(FileContextList::parse("/a").is_err());
    }

    #[test]
    fn test_mixed_mls() {
        let err = FileContextList::parse("/a\tu:r:t:s0\n/b\tu:r:t\n").unwrap_err();
        assert!(matches!(
            err,
            Error::Construction(ConstructionError::MalformedFileContext { line: 2, .. })
        ));
    }

    #[test]
    fn test_class_names() {
        assert_eq!(FileClass::from_flag("-l").and_then(|c| c.class_name()), Some("lnk_file"));
        assert_eq!(FileClass::All.class_name(), None);
        assert_eq!(FileClass::from_flag("-q"), None);
    }
}
