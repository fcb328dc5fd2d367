#![allow(dead_code)]

use repokit_core::{
    open_db_in_memory, Attributes, Entity, EntityId, Migration, RepoError, RepoResult, Repository,
    ALL_COLUMNS,
};
use rusqlite::Connection;

pub const SCHEMA: &[Migration] = &[Migration::new(
    1,
    r#"
CREATE TABLE posts (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    title TEXT NOT NULL,
    body TEXT,
    score INTEGER NOT NULL DEFAULT 0,
    created_at INTEGER,
    updated_at INTEGER,
    deleted_at INTEGER
);
CREATE TABLE comments (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    commentable_type TEXT NOT NULL,
    commentable_id INTEGER NOT NULL,
    body TEXT NOT NULL,
    deleted_at INTEGER
);
CREATE TABLE tags (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE
);
"#,
)];

pub fn open() -> Connection {
    open_db_in_memory(SCHEMA).unwrap()
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Post {
    pub id: Option<EntityId>,
    pub title: String,
    pub body: Option<String>,
    pub score: i64,
    pub created_at: Option<i64>,
    pub updated_at: Option<i64>,
    pub deleted_at: Option<i64>,
    pub comments: Vec<Comment>,
}

impl Post {
    pub fn titled(title: &str) -> Self {
        Self {
            title: title.to_string(),
            ..Self::default()
        }
    }
}

impl Entity for Post {
    fn table_name() -> &'static str {
        "posts"
    }

    fn soft_deletes() -> bool {
        true
    }

    fn timestamps() -> bool {
        true
    }

    fn from_attributes(attributes: Attributes) -> RepoResult<Self> {
        Ok(Self {
            id: attributes.integer("id")?,
            title: attributes.text("title")?.unwrap_or_default(),
            body: attributes.text("body")?,
            score: attributes.integer("score")?.unwrap_or_default(),
            created_at: attributes.integer("created_at")?,
            updated_at: attributes.integer("updated_at")?,
            deleted_at: attributes.integer("deleted_at")?,
            comments: Vec::new(),
        })
    }

    fn to_attributes(&self) -> Attributes {
        Attributes::new()
            .set("title", self.title.clone())
            .set("body", self.body.clone())
            .set("score", self.score)
    }

    fn id(&self) -> Option<EntityId> {
        self.id
    }

    fn load_relations(
        conn: &Connection,
        models: &mut [Self],
        relations: &[String],
    ) -> RepoResult<()> {
        for relation in relations {
            if relation != "comments" {
                return Err(RepoError::InvalidArgument(format!(
                    "posts have no relation `{relation}`"
                )));
            }
            let mut comments = Repository::<Comment>::bind(conn);
            for post in models.iter_mut() {
                let Some(id) = post.id else { continue };
                post.comments = comments
                    .where_eq("commentable_type", Post::morph_type().to_string())
                    .where_eq("commentable_id", id)
                    .order_by("id", true)
                    .get(ALL_COLUMNS)?;
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Comment {
    pub id: Option<EntityId>,
    pub commentable_type: String,
    pub commentable_id: EntityId,
    pub body: String,
    pub deleted_at: Option<i64>,
}

impl Entity for Comment {
    fn table_name() -> &'static str {
        "comments"
    }

    fn soft_deletes() -> bool {
        true
    }

    fn from_attributes(attributes: Attributes) -> RepoResult<Self> {
        Ok(Self {
            id: attributes.integer("id")?,
            commentable_type: attributes.text("commentable_type")?.unwrap_or_default(),
            commentable_id: attributes.integer("commentable_id")?.unwrap_or_default(),
            body: attributes.text("body")?.unwrap_or_default(),
            deleted_at: attributes.integer("deleted_at")?,
        })
    }

    fn to_attributes(&self) -> Attributes {
        Attributes::new()
            .set("commentable_type", self.commentable_type.clone())
            .set("commentable_id", self.commentable_id)
            .set("body", self.body.clone())
    }

    fn id(&self) -> Option<EntityId> {
        self.id
    }

    fn deleting(&self) -> bool {
        self.body != "pinned"
    }

    fn restoring(&self) -> bool {
        self.body != "locked"
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Tag {
    pub id: Option<EntityId>,
    pub name: String,
}

impl Entity for Tag {
    fn table_name() -> &'static str {
        "tags"
    }

    fn from_attributes(attributes: Attributes) -> RepoResult<Self> {
        Ok(Self {
            id: attributes.integer("id")?,
            name: attributes.text("name")?.unwrap_or_default(),
        })
    }

    fn to_attributes(&self) -> Attributes {
        Attributes::new().set("name", self.name.clone())
    }

    fn id(&self) -> Option<EntityId> {
        self.id
    }

    fn saving(&self) -> bool {
        self.name != "forbidden"
    }
}

pub fn seed_post(conn: &Connection, title: &str, score: i64) -> Post {
    Repository::<Post>::bind(conn)
        .create(
            Attributes::new()
                .set("title", title.to_string())
                .set("score", score),
        )
        .unwrap()
}

pub fn seed_comment(conn: &Connection, owner: &Post, body: &str) -> Comment {
    Repository::<Comment>::bind(conn)
        .save(&Comment {
            commentable_type: Post::morph_type().to_string(),
            commentable_id: owner.id.unwrap(),
            body: body.to_string(),
            ..Comment::default()
        })
        .unwrap()
}
