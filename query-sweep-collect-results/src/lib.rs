use anyhow::{Context, Result};
use lazy_read::LazyRead;
use polars::prelude::DataFrame;
use std::io::Read;

use query_sweep_types::SweepRun;
use string_intern::Intern;

/// A member of a run archive, with lazily loaded content.
pub trait FileInfoInterface {
    fn name(&self) -> &str;
    fn content_string(&mut self) -> Result<&str>;
    fn content_bytes(&mut self) -> Result<&[u8]>;
}

pub struct FileInfo<'a, T>
where
    T: Read,
{
    content: LazyRead<T>,
    name: &'a str,
}

impl<T> FileInfoInterface for FileInfo<'_, T>
where
    T: Read,
{
    fn name(&self) -> &str {
        self.name
    }

    fn content_string(&mut self) -> Result<&str> {
        self.content
            .get_string()
            .context("Failed to read the file's contents")
    }

    fn content_bytes(&mut self) -> Result<&[u8]> {
        self.content
            .get_bytes()
            .context("Failed to read the file's contents")
    }
}

impl<'a, T> FileInfo<'a, T>
where
    T: Read,
{
    pub fn new(name: &'a str, content: T) -> Self {
        FileInfo {
            name,
            content: LazyRead::new(content),
        }
    }
}

/// One results collector. It is offered every member of a run archive
/// through `process_file`, then asked once for its named tables.
pub trait SweepCollect {
    fn process_file(&mut self, run: &SweepRun, file: &mut dyn FileInfoInterface) -> Result<()>;

    fn get_result(self: Box<Self>, run: &SweepRun) -> Result<Vec<(Intern, DataFrame)>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_info_exposes_name_and_content() {
        let mut info = FileInfo::new("status.txt", std::io::Cursor::new(b"success\n".to_vec()));
        assert_eq!(info.name(), "status.txt");
        assert_eq!(info.content_string().unwrap(), "success\n");
        assert_eq!(info.content_bytes().unwrap(), b"success\n");
    }
}
