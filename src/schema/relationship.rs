use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationshipKind {
    BelongsTo,
    HasOne,
    HasMany,
    HasManyThrough,
}

impl RelationshipKind {
    /// Relationships that load a collection per parent row.
    pub fn is_collection(&self) -> bool {
        matches!(self, RelationshipKind::HasMany | RelationshipKind::HasManyThrough)
    }
}

/// Referential action on delete/update of the referenced row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CascadeAction {
    Restrict,
    Cascade,
    SetNull,
    #[default]
    NoAction,
}

impl CascadeAction {
    pub fn as_sql(&self) -> &'static str {
        match self {
            CascadeAction::Restrict => "RESTRICT",
            CascadeAction::Cascade => "CASCADE",
            CascadeAction::SetNull => "SET NULL",
            CascadeAction::NoAction => "NO ACTION",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relationship {
    #[serde(default)]
    pub name: String,
    pub kind: RelationshipKind,
    pub target: String,
    pub foreign_key: String,
    #[serde(default)]
    pub on_delete: CascadeAction,
    #[serde(default)]
    pub on_update: CascadeAction,
    #[serde(default)]
    pub through: Option<String>,
}

impl Relationship {
    pub fn new(
        name: impl Into<String>,
        kind: RelationshipKind,
        target: impl Into<String>,
        foreign_key: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            kind,
            target: target.into(),
            foreign_key: foreign_key.into(),
            on_delete: CascadeAction::default(),
            on_update: CascadeAction::default(),
            through: None,
        }
    }

    pub fn belongs_to(
        name: impl Into<String>,
        target: impl Into<String>,
        foreign_key: impl Into<String>,
    ) -> Self {
        Self::new(name, RelationshipKind::BelongsTo, target, foreign_key)
    }

    pub fn has_many(
        name: impl Into<String>,
        target: impl Into<String>,
        foreign_key: impl Into<String>,
    ) -> Self {
        Self::new(name, RelationshipKind::HasMany, target, foreign_key)
    }

    pub fn on_delete(mut self, action: CascadeAction) -> Self {
        self.on_delete = action;
        self
    }

    pub fn through(mut self, table: impl Into<String>) -> Self {
        self.kind = RelationshipKind::HasManyThrough;
        self.through = Some(table.into());
        self
    }
}
