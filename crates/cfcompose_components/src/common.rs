//! Declarations shared by the leaf templates.

use cfcompose_model::Parameter;

/// Environments an `EnvironmentType` may take.
pub const ENVIRONMENT_TYPES: [&str; 2] = ["development", "production"];

/// The global `EnvironmentName` parameter (default `dev`).
#[must_use]
pub fn environment_name() -> Parameter {
    Parameter::new("EnvironmentName").with_default("dev").global()
}

/// The global `EnvironmentType` parameter (default `development`).
#[must_use]
pub fn environment_type() -> Parameter {
    Parameter::new("EnvironmentType")
        .with_default("development")
        .with_allowed_values(ENVIRONMENT_TYPES)
        .global()
}

/// Converts `snake_case` or `kebab-case` names to `PascalCase`, dropping
/// anything that is not ASCII alphanumeric.
///
/// ```
/// use cfcompose_components::common::pascal_case;
///
/// assert_eq!(pascal_case("get_ami"), "GetAmi");
/// assert_eq!(pascal_case("new-ami.uploads"), "NewAmiUploads");
/// ```
#[must_use]
pub fn pascal_case(name: &str) -> String {
    name.split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pascal_case_keeps_inner_capitals() {
        assert_eq!(pascal_case("s3Events"), "S3Events");
        assert_eq!(pascal_case("__"), "");
    }
}
