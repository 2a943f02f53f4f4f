use url::{ParseError, Url};

use crate::types::TargetPath;

const INVALID_SCHEME: &str = "scheme must be s3:// .";
const INVALID_TARGET: &str = "target must be s3://<BUCKET_NAME>[/prefix] .";
const NO_BUCKET_NAME_SPECIFIED: &str = "bucket name must be specified.";

pub fn check_target_url(target: &str) -> Result<String, String> {
    parse_target_url(target)?;

    Ok(target.to_string())
}

pub fn parse_target_url(target: &str) -> Result<TargetPath, String> {
    let result = Url::parse(target);
    if result == Err(ParseError::RelativeUrlWithoutBase) {
        return Err(INVALID_SCHEME.to_string());
    }
    if result.is_err() {
        return Err(INVALID_TARGET.to_string());
    }

    let parsed = result.unwrap();
    if parsed.scheme() != "s3" {
        return Err(INVALID_SCHEME.to_string());
    }

    let Some(bucket) = parsed.host_str() else {
        return Err(NO_BUCKET_NAME_SPECIFIED.to_string());
    };

    let prefix = parsed.path().trim_start_matches('/').to_string();

    Ok(TargetPath {
        bucket: bucket.to_string(),
        prefix,
    })
}
