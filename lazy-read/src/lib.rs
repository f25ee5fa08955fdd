use std::io::Read;

mod error;
pub use error::{Error, Result};

/// Wraps a reader and pulls its full contents at most once, on first
/// access. Both the byte and UTF-8 views borrow the same buffer.
pub enum LazyRead<T>
where
    T: Read,
{
    Pending(T),
    Loaded(Vec<u8>),
}

impl<T> LazyRead<T>
where
    T: Read,
{
    pub fn new(input: T) -> Self {
        Self::Pending(input)
    }

    pub fn get_bytes(&mut self) -> Result<&[u8]> {
        if let LazyRead::Pending(reader) = self {
            let mut buf = Vec::new();
            reader.read_to_end(&mut buf)?;
            *self = LazyRead::Loaded(buf);
        }

        Ok(match self {
            LazyRead::Loaded(buf) => buf,
            LazyRead::Pending(_) => unreachable!(),
        })
    }

    pub fn get_string(&mut self) -> Result<&str> {
        Ok(std::str::from_utf8(self.get_bytes()?)?)
    }
}
