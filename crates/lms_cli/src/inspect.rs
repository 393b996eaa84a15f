//! Read-only inspection of deployed stacks.
//!
//! Thin wrapper over the provider SDK: list the stacks deployed in the
//! active account/region, and resolve a secret reference to its live
//! value. Secret resolution is the one audited point where a reference
//! becomes plaintext; nothing else in the workspace can do it.

use aws_config::meta::region::RegionProviderChain;
use aws_sdk_cloudformation::model::Stack;
use aws_sdk_cloudformation::Region;

#[derive(thiserror::Error, Debug)]
pub enum InspectError {
    #[error("Service error occurred: {0}")]
    ServiceError(String),

    #[error("No stacks deployed in this account/region")]
    NoStacks,

    #[error("Secret has no string value: {0}")]
    SecretNotString(String),

    #[error("Unknown error occurred: {0}")]
    Unknown(String),
}

pub struct StackInspector {
    cloudformation: aws_sdk_cloudformation::Client,
    iam: aws_sdk_iam::Client,
    secrets: aws_sdk_secretsmanager::Client,
}

impl StackInspector {
    pub async fn new(region: Option<String>) -> Self {
        let region = match region {
            Some(provided) => Some(Region::new(provided)),
            None => RegionProviderChain::default_provider().region().await,
        };

        let mut loader = aws_config::from_env();
        if let Some(region) = region {
            loader = loader.region(region);
        }
        let sdk_config = loader.load().await;

        Self {
            cloudformation: aws_sdk_cloudformation::Client::new(&sdk_config),
            iam: aws_sdk_iam::Client::new(&sdk_config),
            secrets: aws_sdk_secretsmanager::Client::new(&sdk_config),
        }
    }

    /// All stacks deployed in the active account/region.
    pub async fn list_stacks(&self) -> Result<Vec<Stack>, InspectError> {
        let result = self.cloudformation.describe_stacks().send().await;

        let result = match result {
            Ok(data) => data,
            Err(aws_sdk_cloudformation::types::SdkError::ServiceError { err, .. }) => {
                return Err(InspectError::ServiceError(err.to_string()));
            }
            Err(err) => return Err(InspectError::Unknown(err.to_string())),
        };

        let stacks = result.stacks().unwrap_or_default().to_vec();
        if stacks.is_empty() {
            return Err(InspectError::NoStacks);
        }
        Ok(stacks)
    }

    /// Friendly account alias, when one is set. Listing works without
    /// it, so failures degrade to `None` rather than aborting.
    pub async fn account_alias(&self) -> Option<String> {
        let result = self.iam.list_account_aliases().send().await.ok()?;
        result.account_aliases()?.first().cloned()
    }

    /// Resolve a secret reference to its live value. This is the
    /// explicit, audited dereference point.
    pub async fn reveal_secret(&self, arn: &str) -> Result<String, InspectError> {
        let result = self.secrets.get_secret_value().secret_id(arn).send().await;

        let output = match result {
            Ok(data) => data,
            Err(aws_sdk_secretsmanager::types::SdkError::ServiceError { err, .. }) => {
                return Err(InspectError::ServiceError(err.to_string()));
            }
            Err(err) => return Err(InspectError::Unknown(err.to_string())),
        };

        output
            .secret_string()
            .map(str::to_string)
            .ok_or_else(|| InspectError::SecretNotString(arn.to_string()))
    }
}

/// Pull region and account out of a stack id ARN
/// (`arn:aws:cloudformation:region:account:stack/...`).
pub fn region_and_account(stack_id: &str) -> Option<(String, String)> {
    let mut parts = stack_id.splitn(6, ':');
    let (arn, _partition, service) = (parts.next()?, parts.next()?, parts.next()?);
    if arn != "arn" || service != "cloudformation" {
        return None;
    }
    let region = parts.next()?;
    let account = parts.next()?;
    if region.is_empty() || account.is_empty() {
        return None;
    }
    Some((region.to_string(), account.to_string()))
}

/// Whether an output value looks like a secret reference worth
/// dereferencing on request.
pub fn is_secret_reference(value: &str) -> bool {
    value.starts_with("arn:") && value.contains(":secretsmanager:")
}

/// `dd/mm/yyyy` rendering of a provider timestamp.
pub fn format_date(time: &aws_sdk_cloudformation::types::DateTime) -> String {
    format_epoch(time.secs(), "%d/%m/%Y")
}

/// `hh:mm:ss` rendering of a provider timestamp.
pub fn format_time(time: &aws_sdk_cloudformation::types::DateTime) -> String {
    format_epoch(time.secs(), "%H:%M:%S")
}

fn format_epoch(secs: i64, pattern: &str) -> String {
    chrono::DateTime::from_timestamp(secs, 0)
        .map(|t| t.format(pattern).to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_region_and_account_from_stack_id() {
        let id = "arn:aws:cloudformation:eu-west-2:111111111111:stack/moodle-dev/abc123";
        let (region, account) = region_and_account(id).unwrap();
        assert_eq!(region, "eu-west-2");
        assert_eq!(account, "111111111111");
    }

    #[test]
    fn test_region_and_account_rejects_other_arns() {
        assert!(region_and_account("arn:aws:iam::111111111111:role/foo").is_none());
        assert!(region_and_account("not-an-arn").is_none());
    }

    #[test]
    fn test_secret_reference_detection() {
        assert!(is_secret_reference(
            "arn:aws:secretsmanager:eu-west-2:111111111111:secret:MoodleAdminSecret-x1"
        ));
        assert!(!is_secret_reference("moodleadmin"));
        assert!(!is_secret_reference(
            "arn:aws:acm:eu-west-2:111111111111:certificate/abc"
        ));
    }

    #[test]
    fn test_epoch_formatting() {
        assert_eq!(format_epoch(0, "%d/%m/%Y"), "01/01/1970");
        assert_eq!(format_epoch(0, "%H:%M:%S"), "00:00:00");
    }
}
