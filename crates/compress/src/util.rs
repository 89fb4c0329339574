use crate::Compression;
use std::fmt::{Display, Formatter, Result as FmtResult};

impl Display for Compression {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.as_str())
    }
}

impl AsRef<str> for Compression {
    fn as_ref(&self) -> &'static str {
        self.as_str()
    }
}

impl Compression {
    /// Returns the file extension for this compression format.
    #[inline]
    #[must_use]
    pub fn extension(&self) -> &'static str {
        match self {
            Compression::None => "",
            Compression::Gzip => ".gz",
        }
    }

    /// Returns the short name for configuration (for displaying to user)
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Compression::None => "none",
            Compression::Gzip => "gzip",
        }
    }

    /// Appends this format's extension to a file name.
    ///
    /// ```
    /// use novelsync_compress::Compression;
    ///
    /// assert_eq!(Compression::Gzip.apply_to("!cache.json"), "!cache.json.gz");
    /// assert_eq!(Compression::None.apply_to("!cache.json"), "!cache.json");
    /// ```
    #[must_use]
    pub fn apply_to(&self, name: &str) -> String {
        format!("{name}{}", self.extension())
    }
}
