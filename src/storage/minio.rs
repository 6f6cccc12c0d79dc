//! S3-compatible object store backend (AWS S3, MinIO).

use std::fmt;

use aws_config::{BehaviorVersion, Region};
use aws_sdk_s3::config::{Builder, Credentials};
use aws_sdk_s3::operation::head_object::HeadObjectError;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use bytes::Bytes;
use tracing::{debug, trace};

use super::{is_hidden_name, is_pattern, part_name, SUCCESS_MARKER};

pub const DEFAULT_REGION: &str = "us-east-1";

/// Connection settings for the object store.
///
/// With both keys set, the client is built from these values alone (the usual
/// setup for a local MinIO). Otherwise the standard AWS environment chain
/// supplies credentials.
#[derive(Clone, Default)]
pub struct ObjectStoreConfig {
    pub endpoint: Option<String>,
    pub region: Option<String>,
    pub access_key: Option<String>,
    pub secret_key: Option<String>,
}

impl fmt::Debug for ObjectStoreConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectStoreConfig")
            .field("endpoint", &self.endpoint)
            .field("region", &self.region)
            .field("access_key", &self.access_key)
            .field("secret_key", &self.secret_key.as_ref().map(|_| "***"))
            .finish()
    }
}

pub struct S3Store {
    client: Client,
}

impl S3Store {
    pub async fn connect(config: &ObjectStoreConfig) -> Self {
        let region = Region::new(
            config
                .region
                .clone()
                .unwrap_or_else(|| DEFAULT_REGION.to_string()),
        );

        let client = match (&config.access_key, &config.secret_key) {
            (Some(access_key), Some(secret_key)) => {
                let credentials =
                    Credentials::new(access_key, secret_key, None, None, "wclite");
                let mut builder = Builder::new()
                    .region(region)
                    .credentials_provider(credentials)
                    .behavior_version(BehaviorVersion::latest())
                    .force_path_style(true);
                if let Some(endpoint) = &config.endpoint {
                    builder = builder.endpoint_url(endpoint);
                }
                Client::from_conf(builder.build())
            }
            _ => {
                let mut loader = aws_config::defaults(BehaviorVersion::latest()).region(region);
                if let Some(endpoint) = &config.endpoint {
                    loader = loader.endpoint_url(endpoint);
                }
                let shared = loader.load().await;
                let conf = Builder::from(&shared)
                    .force_path_style(config.endpoint.is_some())
                    .build();
                Client::from_conf(conf)
            }
        };
        debug!(endpoint = ?config.endpoint, "object store client ready");

        Self { client }
    }

    pub async fn object_exists(&self, bucket: &str, key: &str) -> anyhow::Result<bool> {
        match self.client.head_object().bucket(bucket).key(key).send().await {
            Ok(_) => Ok(true),
            Err(err) => match err.into_service_error() {
                HeadObjectError::NotFound(_) => Ok(false),
                other => Err(other.into()),
            },
        }
    }

    async fn any_with_prefix(&self, bucket: &str, prefix: &str) -> anyhow::Result<bool> {
        let resp = self
            .client
            .list_objects_v2()
            .bucket(bucket)
            .prefix(prefix)
            .max_keys(1)
            .send()
            .await?;
        Ok(!resp.contents().is_empty())
    }

    /// True if `key` is an object or a non-empty "directory".
    pub async fn exists(&self, bucket: &str, key: &str) -> anyhow::Result<bool> {
        if !key.is_empty() && self.object_exists(bucket, key).await? {
            return Ok(true);
        }
        self.any_with_prefix(bucket, &dir_prefix(key)).await
    }

    pub async fn list_files_with_prefix(
        &self,
        bucket: &str,
        prefix: &str,
    ) -> anyhow::Result<Vec<String>> {
        let mut keys = Vec::new();
        let mut token: Option<String> = None;
        loop {
            let resp = self
                .client
                .list_objects_v2()
                .bucket(bucket)
                .prefix(prefix)
                .set_continuation_token(token.take())
                .send()
                .await?;
            keys.extend(
                resp.contents()
                    .iter()
                    .filter_map(|object| object.key().map(str::to_owned)),
            );
            match resp.next_continuation_token() {
                Some(next) if resp.is_truncated().unwrap_or(false) => token = Some(next.to_owned()),
                _ => break,
            }
        }
        Ok(keys)
    }

    /// Expand `key` the same way local paths are expanded: an exact object,
    /// the visible objects one level under `key/`, or glob matches.
    pub async fn resolve(&self, bucket: &str, key: &str) -> anyhow::Result<Vec<String>> {
        if is_pattern(key) {
            let literal = key.find(['*', '?', '[']).unwrap_or(key.len());
            let keys = self.list_files_with_prefix(bucket, &key[..literal]).await?;
            return glob_keys(key, keys);
        }

        if !key.is_empty() && self.object_exists(bucket, key).await? {
            return Ok(vec![key.to_owned()]);
        }

        let prefix = dir_prefix(key);
        let keys = self.list_files_with_prefix(bucket, &prefix).await?;
        Ok(children(&prefix, keys))
    }

    pub async fn get_object(&self, bucket: &str, key: &str) -> anyhow::Result<Bytes> {
        trace!(bucket, key, "get object");
        let object = self.client.get_object().bucket(bucket).key(key).send().await?;
        Ok(object.body.collect().await?.into_bytes())
    }

    pub async fn upload_bytes(&self, bucket: &str, key: &str, data: Bytes) -> anyhow::Result<()> {
        trace!(bucket, key, len = data.len(), "put object");
        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(ByteStream::from(data))
            .send()
            .await?;
        Ok(())
    }

    /// Upload every part under `key/`, then the success marker.
    pub async fn commit(&self, bucket: &str, key: &str, parts: Vec<Bytes>) -> anyhow::Result<usize> {
        let prefix = dir_prefix(key);
        let count = parts.len();
        for (index, data) in parts.into_iter().enumerate() {
            self.upload_bytes(bucket, &format!("{}{}", prefix, part_name(index)), data)
                .await?;
        }
        self.upload_bytes(bucket, &format!("{}{}", prefix, SUCCESS_MARKER), Bytes::new())
            .await?;
        debug!(bucket, key, parts = count, "committed output");
        Ok(count)
    }
}

fn dir_prefix(key: &str) -> String {
    if key.is_empty() {
        String::new()
    } else {
        format!("{}/", key.trim_end_matches('/'))
    }
}

fn basename(key: &str) -> &str {
    key.rsplit('/').next().unwrap_or(key)
}

/// Visible keys directly under `prefix`.
fn children(prefix: &str, keys: Vec<String>) -> Vec<String> {
    keys.into_iter()
        .filter(|k| match k.strip_prefix(prefix) {
            Some(rest) => !rest.is_empty() && !rest.contains('/') && !is_hidden_name(rest),
            None => false,
        })
        .collect()
}

/// Keys selected by the glob `pattern`, one path segment per wildcard.
///
/// A key matching the pattern is taken as a file. A "directory" matching the
/// pattern contributes its visible keys one level down. Hidden names are
/// skipped in both cases.
fn glob_keys(pattern: &str, keys: Vec<String>) -> anyhow::Result<Vec<String>> {
    let pattern = glob::Pattern::new(pattern)?;
    let options = glob::MatchOptions {
        require_literal_separator: true,
        ..Default::default()
    };
    let matches =
        |path: &str| pattern.matches_with(path, options) && !is_hidden_name(basename(path));

    Ok(keys
        .into_iter()
        .filter(|k| {
            if matches(k.as_str()) {
                return true;
            }
            match k.rsplit_once('/') {
                Some((dir, name)) => !is_hidden_name(name) && matches(dir),
                None => false,
            }
        })
        .collect())
}
