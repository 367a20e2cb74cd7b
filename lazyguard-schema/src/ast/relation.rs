//! Relation metadata: the five shapes a related-object access can take.

use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

/// The shape of a relation as seen from the model that declares the accessor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RelationKind {
    /// A one-to-one declared on this model.
    ForwardOneToOne,
    /// A foreign key declared on this model.
    ForwardManyToOne,
    /// The other side of a one-to-one declared elsewhere.
    ReverseOneToOne,
    /// The other side of a foreign key declared elsewhere (a manager).
    ReverseManyToOne,
    /// A many-to-many declared on this model (a manager).
    ManyToMany,
    /// The other side of a many-to-many declared elsewhere (a manager).
    ReverseManyToMany,
}

impl RelationKind {
    /// Check if this relation resolves to a collection manager.
    pub fn is_plural(&self) -> bool {
        matches!(
            self,
            Self::ReverseManyToOne | Self::ManyToMany | Self::ReverseManyToMany
        )
    }

    /// Check if this relation resolves to at most one record.
    pub fn is_singular(&self) -> bool {
        !self.is_plural()
    }

    /// Check if the relation is declared on this model.
    pub fn is_forward(&self) -> bool {
        matches!(
            self,
            Self::ForwardOneToOne | Self::ForwardManyToOne | Self::ManyToMany
        )
    }

    /// Check if this is either side of a one-to-one.
    pub fn is_one_to_one(&self) -> bool {
        matches!(self, Self::ForwardOneToOne | Self::ReverseOneToOne)
    }

    /// Check if this is either side of a many-to-many.
    pub fn is_many_to_many(&self) -> bool {
        matches!(self, Self::ManyToMany | Self::ReverseManyToMany)
    }

    /// The kind of the accessor derived on the related model.
    pub fn reverse(&self) -> Self {
        match self {
            Self::ForwardOneToOne => Self::ReverseOneToOne,
            Self::ForwardManyToOne => Self::ReverseManyToOne,
            Self::ReverseOneToOne => Self::ForwardOneToOne,
            Self::ReverseManyToOne => Self::ForwardManyToOne,
            Self::ManyToMany => Self::ReverseManyToMany,
            Self::ReverseManyToMany => Self::ManyToMany,
        }
    }
}

impl std::fmt::Display for RelationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ForwardOneToOne => write!(f, "1:1"),
            Self::ForwardManyToOne => write!(f, "n:1"),
            Self::ReverseOneToOne => write!(f, "1:1 (reverse)"),
            Self::ReverseManyToOne => write!(f, "1:n"),
            Self::ManyToMany => write!(f, "m:n"),
            Self::ReverseManyToMany => write!(f, "m:n (reverse)"),
        }
    }
}

/// Specification for a join table (many-to-many).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinTable {
    /// Name of the join table.
    pub table_name: SmolStr,
    /// Column referencing the model that owns the accessor.
    pub source_column: SmolStr,
    /// Column referencing the related model.
    pub target_column: SmolStr,
}

impl JoinTable {
    /// Create a new join table spec.
    pub fn new(
        table_name: impl Into<SmolStr>,
        source_column: impl Into<SmolStr>,
        target_column: impl Into<SmolStr>,
    ) -> Self {
        Self {
            table_name: table_name.into(),
            source_column: source_column.into(),
            target_column: target_column.into(),
        }
    }

    /// The same table seen from the other side.
    pub fn flipped(&self) -> Self {
        Self {
            table_name: self.table_name.clone(),
            source_column: self.target_column.clone(),
            target_column: self.source_column.clone(),
        }
    }
}

/// A relation accessor on a model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relation {
    /// Accessor name on the owning model.
    pub name: SmolStr,
    /// Model that owns the accessor (filled in when added to a model).
    pub model: SmolStr,
    /// Shape of the relation.
    pub kind: RelationKind,
    /// The model on the other side.
    pub related_model: SmolStr,
    /// Foreign key column. For forward relations it lives on `model`,
    /// for reverse foreign keys it lives on `related_model`.
    pub column: Option<SmolStr>,
    /// Accessor name on the other side.
    pub related_name: Option<SmolStr>,
    /// Join table for many-to-many relations.
    pub join_table: Option<JoinTable>,
    /// Whether a forward foreign key column accepts null.
    pub nullable: bool,
}

impl Relation {
    fn new(name: impl Into<SmolStr>, kind: RelationKind, related_model: impl Into<SmolStr>) -> Self {
        Self {
            name: name.into(),
            model: SmolStr::default(),
            kind,
            related_model: related_model.into(),
            column: None,
            related_name: None,
            join_table: None,
            nullable: false,
        }
    }

    /// Declare a foreign key (many-to-one) to `related_model`.
    pub fn foreign_key(name: impl Into<SmolStr>, related_model: impl Into<SmolStr>) -> Self {
        Self::new(name, RelationKind::ForwardManyToOne, related_model)
    }

    /// Declare a one-to-one to `related_model`.
    pub fn one_to_one(name: impl Into<SmolStr>, related_model: impl Into<SmolStr>) -> Self {
        Self::new(name, RelationKind::ForwardOneToOne, related_model)
    }

    /// Declare a many-to-many to `related_model`.
    pub fn many_to_many(name: impl Into<SmolStr>, related_model: impl Into<SmolStr>) -> Self {
        Self::new(name, RelationKind::ManyToMany, related_model)
    }

    /// Set the accessor name derived on the related model.
    pub fn related_name(mut self, name: impl Into<SmolStr>) -> Self {
        self.related_name = Some(name.into());
        self
    }

    /// Override the foreign key column name.
    pub fn column(mut self, column: impl Into<SmolStr>) -> Self {
        self.column = Some(column.into());
        self
    }

    /// Allow the foreign key column to be null.
    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    /// Get the accessor name as a string.
    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    /// The foreign key column, if this relation has one.
    pub fn column_name(&self) -> Option<&str> {
        self.column.as_deref()
    }

    /// Build the accessor that the related model gets for this relation.
    ///
    /// Only meaningful for forward relations; `accessor` is the resolved
    /// related name.
    pub fn reversed(&self, accessor: impl Into<SmolStr>) -> Self {
        Self {
            name: accessor.into(),
            model: self.related_model.clone(),
            kind: self.kind.reverse(),
            related_model: self.model.clone(),
            column: self.column.clone(),
            related_name: Some(self.name.clone()),
            join_table: self.join_table.as_ref().map(JoinTable::flipped),
            nullable: self.nullable,
        }
    }

    /// The default accessor name on the related model.
    pub fn default_related_name(&self) -> SmolStr {
        let owner = self.model.to_lowercase();
        if self.kind.is_one_to_one() {
            SmolStr::new(owner)
        } else {
            SmolStr::new(format!("{}_set", owner))
        }
    }

    /// Get the join table name for many-to-many relations.
    pub fn join_table_name(&self) -> Option<String> {
        if !self.kind.is_many_to_many() {
            return None;
        }

        // Sort model names for consistent naming
        let mut names = [self.model.to_lowercase(), self.related_model.to_lowercase()];
        names.sort();

        Some(format!("_{}_to_{}", names[0], names[1]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relation_kind_shapes() {
        assert!(RelationKind::ReverseManyToOne.is_plural());
        assert!(RelationKind::ManyToMany.is_plural());
        assert!(RelationKind::ReverseManyToMany.is_plural());
        assert!(RelationKind::ForwardOneToOne.is_singular());
        assert!(RelationKind::ReverseOneToOne.is_singular());
        assert!(RelationKind::ForwardManyToOne.is_singular());
        assert!(RelationKind::ManyToMany.is_forward());
        assert!(!RelationKind::ReverseOneToOne.is_forward());
    }

    #[test]
    fn test_relation_kind_reverse_round_trip() {
        for kind in [
            RelationKind::ForwardOneToOne,
            RelationKind::ForwardManyToOne,
            RelationKind::ManyToMany,
        ] {
            assert_eq!(kind.reverse().reverse(), kind);
        }
    }

    #[test]
    fn test_default_related_name() {
        let mut fk = Relation::foreign_key("role", "Role");
        fk.model = "User".into();
        assert_eq!(fk.default_related_name(), "user_set");

        let mut o2o = Relation::one_to_one("user", "User");
        o2o.model = "Profile".into();
        assert_eq!(o2o.default_related_name(), "profile");
    }

    #[test]
    fn test_join_table_name_is_sorted() {
        let mut m2m = Relation::many_to_many("tags", "Tag");
        m2m.model = "Post".into();
        assert_eq!(m2m.join_table_name(), Some("_post_to_tag".to_string()));
        assert_eq!(Relation::foreign_key("role", "Role").join_table_name(), None);
    }

    #[test]
    fn test_reversed_foreign_key() {
        let mut fk = Relation::foreign_key("role", "Role").column("role_id");
        fk.model = "User".into();
        let reverse = fk.reversed("users");

        assert_eq!(reverse.name, "users");
        assert_eq!(reverse.model, "Role");
        assert_eq!(reverse.kind, RelationKind::ReverseManyToOne);
        assert_eq!(reverse.related_model, "User");
        assert_eq!(reverse.column_name(), Some("role_id"));
        assert_eq!(reverse.related_name.as_deref(), Some("role"));
    }
}
