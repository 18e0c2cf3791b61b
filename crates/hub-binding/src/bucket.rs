use std::path::Path;

use crate::api;
use crate::client::Client;
use crate::error::{ErrorKind, Result};
use crate::path::{self, Params};
use crate::sender::{HttpSend, ReqwestSender};

/// Content of one bucket; paths are relative to the bucket root.
pub struct BucketContent<'a, S = ReqwestSender> {
    client: &'a Client<S>,
    root: String,
}

impl<S: HttpSend> Client<S> {
    pub fn bucket(&self, id: u64) -> BucketContent<'_, S> {
        let params = Params::new().with(api::ID, id).with(api::WILDCARD, "");
        BucketContent {
            client: self,
            root: path::Path::new(api::BUCKET_CONTENT_ROUTE).inject(&params),
        }
    }
}

impl<S: HttpSend> BucketContent<'_, S> {
    pub fn root(&self) -> &str {
        &self.root
    }

    pub fn path(&self, relative: &str) -> String {
        path::join(&self.root, relative)
    }

    pub async fn get(&self, source: &str, destination: &Path) -> Result<()> {
        self.client.bucket_get(&self.path(source), destination).await
    }

    pub async fn put(&self, source: &Path, destination: &str) -> Result<()> {
        self.client.bucket_put(source, &self.path(destination)).await
    }

    pub async fn delete(&self, relative: &str) -> Result<()> {
        self.client.delete(&self.path(relative), &[]).await
    }
}

/// Treat Conflict (already exists) as success.
pub fn ensure(result: Result<()>) -> Result<()> {
    match result {
        Err(err) if err.is(ErrorKind::Conflict) => Ok(()),
        other => other,
    }
}
