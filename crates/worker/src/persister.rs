use std::path::PathBuf;

use async_trait::async_trait;
use worker_engine::Persister;
use uuid::Uuid;

/// Writes resized thumbnails to `{output_dir}/{identifier}.jpg`. A
/// stand-in for a production blob-store sink, demonstrating the
/// [`Persister`] seam without depending on one.
pub struct FilePersister {
    output_dir: PathBuf,
}

impl FilePersister {
    pub async fn new(output_dir: PathBuf) -> anyhow::Result<Self> {
        tokio::fs::create_dir_all(&output_dir).await?;
        Ok(Self { output_dir })
    }
}

#[async_trait]
impl Persister for FilePersister {
    async fn persist(&self, bytes: &[u8], identifier: Uuid) -> anyhow::Result<()> {
        let path = self.output_dir.join(format!("{identifier}.jpg"));
        tokio::fs::write(&path, bytes).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn writes_bytes_to_identifier_named_file() {
        let dir = tempfile::tempdir().unwrap();
        let persister = FilePersister::new(dir.path().to_path_buf()).await.unwrap();
        let id = Uuid::new_v4();

        persister.persist(b"hello", id).await.unwrap();

        let contents = tokio::fs::read(dir.path().join(format!("{id}.jpg"))).await.unwrap();
        assert_eq!(contents, b"hello");
    }
}
