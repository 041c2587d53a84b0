use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationKind {
    OneToOne,
    OneToMany,
}

/// Relationship between a principal entity and a dependent entity
///
/// The dependent holds the foreign key. When `foreign_key` is empty the
/// resolver synthesizes `<Principal>Id`; when `principal_key` is empty the
/// foreign key targets the principal's primary key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationDefinition {
    pub kind: RelationKind,
    pub principal: String,
    pub dependent: String,
    /// Navigation name on the principal side (defaults to the dependent name)
    pub navigation: Option<String>,
    /// Navigation name on the dependent side (defaults to the principal name)
    pub inverse_navigation: Option<String>,
    pub foreign_key: Vec<String>,
    pub principal_key: Vec<String>,
}

impl RelationDefinition {
    pub fn new(
        kind: RelationKind,
        principal: impl Into<String>,
        dependent: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            principal: principal.into(),
            dependent: dependent.into(),
            navigation: None,
            inverse_navigation: None,
            foreign_key: Vec::new(),
            principal_key: Vec::new(),
        }
    }

    pub fn one_to_one(principal: impl Into<String>, dependent: impl Into<String>) -> Self {
        Self::new(RelationKind::OneToOne, principal, dependent)
    }

    pub fn one_to_many(principal: impl Into<String>, dependent: impl Into<String>) -> Self {
        Self::new(RelationKind::OneToMany, principal, dependent)
    }

    pub fn named(mut self, navigation: impl Into<String>) -> Self {
        self.navigation = Some(navigation.into());
        self
    }

    pub fn with_inverse(mut self, navigation: impl Into<String>) -> Self {
        self.inverse_navigation = Some(navigation.into());
        self
    }

    pub fn with_foreign_key<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.foreign_key = fields.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_principal_key<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.principal_key = fields.into_iter().map(Into::into).collect();
        self
    }

    /// Name used to load dependents from a principal instance
    pub fn navigation_name(&self) -> &str {
        self.navigation.as_deref().unwrap_or(&self.dependent)
    }

    /// Name used to load the principal from a dependent instance
    pub fn inverse_name(&self) -> &str {
        self.inverse_navigation.as_deref().unwrap_or(&self.principal)
    }

    pub fn involves(&self, entity: &str) -> bool {
        self.principal == entity || self.dependent == entity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_navigation_names() {
        let rel = RelationDefinition::one_to_many("Blog0", "Post0");
        assert_eq!(rel.navigation_name(), "Post0");
        assert_eq!(rel.inverse_name(), "Blog0");

        let named = rel.named("Posts").with_inverse("Blog");
        assert_eq!(named.navigation_name(), "Posts");
        assert_eq!(named.inverse_name(), "Blog");
    }
}
