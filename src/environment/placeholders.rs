// ABOUTME: Substitution of environment placeholders in role ARNs and asset destinations.
// ABOUTME: Supports ${AWS::AccountId}, ${AWS::Region} and ${AWS::Partition}.

const ACCOUNT: &str = "${AWS::AccountId}";
const REGION: &str = "${AWS::Region}";
const PARTITION: &str = "${AWS::Partition}";

pub fn has_placeholders(value: &str) -> bool {
    value.contains(ACCOUNT) || value.contains(REGION) || value.contains(PARTITION)
}

pub(crate) fn needs_partition(value: &str) -> bool {
    value.contains(PARTITION)
}

pub fn replace_env_placeholders(value: &str, account: &str, region: &str, partition: &str) -> String {
    value
        .replace(ACCOUNT, account)
        .replace(REGION, region)
        .replace(PARTITION, partition)
}
