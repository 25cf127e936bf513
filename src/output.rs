use std::fs::File;
use std::io;
use std::sync::Arc;

/// Output handle shared by every block worker.
///
/// Writes are positional, so workers never contend on a shared cursor. Each
/// worker only ever writes inside its own byte range.
#[derive(Debug, Clone)]
pub struct OutputFile {
    file: Arc<File>,
}

impl OutputFile {
    pub fn new(file: File) -> Self {
        Self {
            file: Arc::new(file),
        }
    }

    pub async fn write_at(&self, data: Vec<u8>, offset: u64) -> io::Result<()> {
        let file = self.file.clone();
        tokio::task::spawn_blocking(move || write_all_at(&file, &data, offset))
            .await
            .map_err(io::Error::other)?
    }

    pub fn len(&self) -> io::Result<u64> {
        Ok(self.file.metadata()?.len())
    }

    pub fn is_empty(&self) -> io::Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Reserves the final size up front.
    pub fn preallocate(&self, size: u64) -> io::Result<()> {
        if self.len()? < size {
            self.file.set_len(size)?;
        }
        Ok(())
    }

    pub fn sync(&self) -> io::Result<()> {
        self.file.sync_all()
    }
}

#[cfg(unix)]
fn write_all_at(file: &File, data: &[u8], offset: u64) -> io::Result<()> {
    use std::os::unix::fs::FileExt;
    file.write_all_at(data, offset)
}

#[cfg(windows)]
fn write_all_at(file: &File, mut data: &[u8], mut offset: u64) -> io::Result<()> {
    use std::os::windows::fs::FileExt;
    while !data.is_empty() {
        match file.seek_write(data, offset) {
            Ok(0) => return Err(io::ErrorKind::WriteZero.into()),
            Ok(n) => {
                data = &data[n..];
                offset += n as u64;
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(())
}
