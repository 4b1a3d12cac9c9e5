use crate::error::{Error, Result};
use crate::header::HEADER_SIZE;

/// Default number of hashed pages in a freshly created file.
pub const DEFAULT_INITIAL_PAGE_COUNT: u16 = 64;
/// Two 4 KiB OS pages.
pub const DEFAULT_PAGE_SIZE: u16 = 8192;
pub const DEFAULT_RESIZE_MULTIPLIER: u16 = 2;

/// Configuration for creating or opening a pskv file.
///
/// `page_size` and `initial_page_count` only apply when a file is created;
/// an existing file keeps the values recorded in its header.
///
/// ```
/// use pskv::Options;
///
/// let opts = Options::default()
///     .initial_page_count(2)
///     .page_size(4096)
///     .resize_multiplier(4);
/// assert!(opts.validate().is_ok());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Options {
    pub(crate) initial_page_count: u16,
    pub(crate) page_size: u16,
    pub(crate) resize_multiplier: u16,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            initial_page_count: DEFAULT_INITIAL_PAGE_COUNT,
            page_size: DEFAULT_PAGE_SIZE,
            resize_multiplier: DEFAULT_RESIZE_MULTIPLIER,
        }
    }
}

impl Options {
    pub fn initial_page_count(mut self, pages: u16) -> Self {
        self.initial_page_count = pages;
        self
    }

    pub fn page_size(mut self, bytes: u16) -> Self {
        self.page_size = bytes;
        self
    }

    pub fn resize_multiplier(mut self, multiplier: u16) -> Self {
        self.resize_multiplier = multiplier;
        self
    }

    pub fn get_initial_page_count(&self) -> u16 {
        self.initial_page_count
    }

    pub fn get_page_size(&self) -> u16 {
        self.page_size
    }

    pub fn get_resize_multiplier(&self) -> u16 {
        self.resize_multiplier
    }

    /// Checks the values against the limits of the file format.
    pub fn validate(&self) -> Result<()> {
        if self.initial_page_count == 0 {
            return Err(Error::InvalidOptions(
                "initial_page_count must be at least 1".into(),
            ));
        }
        if (self.page_size as usize) < HEADER_SIZE {
            return Err(Error::InvalidOptions(format!(
                "page_size must be at least {HEADER_SIZE} bytes, got {}",
                self.page_size
            )));
        }
        if self.resize_multiplier < 2 {
            return Err(Error::InvalidOptions(format!(
                "resize_multiplier must be greater than 1, got {}",
                self.resize_multiplier
            )));
        }
        Ok(())
    }
}
