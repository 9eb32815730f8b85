//! Persistence gateway. Every SQL statement in the crate lives here; the
//! engine and the handlers only call these typed operations.

use sqlx::SqlitePool;

use crate::db::{Contact, Conversation, Message, User};

pub async fn insert_user(pool: &SqlitePool, username: &str) -> Result<User, sqlx::Error> {
    let res = sqlx::query("INSERT INTO users (username) VALUES (?)")
        .bind(username)
        .execute(pool)
        .await?;

    Ok(User {
        id: res.last_insert_rowid(),
        username: username.to_owned(),
    })
}

pub async fn user_exists(pool: &SqlitePool, user_id: i64) -> Result<bool, sqlx::Error> {
    Ok(sqlx::query_as::<_, (i64,)>("SELECT 1 FROM users WHERE id=?")
        .bind(user_id)
        .fetch_optional(pool)
        .await?
        .is_some())
}

/// Inserts the conversation and all member rows in one transaction; a
/// partially-inserted member set is never observable.
pub async fn insert_conversation_atomic(
    pool: &SqlitePool,
    name: &str,
    member_ids: &[i64],
    created_at: i64,
) -> Result<Conversation, sqlx::Error> {
    let is_group = member_ids.len() > 2;

    let mut tx = pool.begin().await?;

    let res = sqlx::query("INSERT INTO conversations (name,is_group,created_at) VALUES (?,?,?)")
        .bind(name)
        .bind(is_group)
        .bind(created_at)
        .execute(&mut *tx)
        .await?;
    let conversation_id = res.last_insert_rowid();

    for user_id in member_ids {
        sqlx::query("INSERT INTO conversation_members (user_id,conversation_id) VALUES (?,?)")
            .bind(user_id)
            .bind(conversation_id)
            .execute(&mut *tx)
            .await?;
    }

    tx.commit().await?;

    Ok(Conversation {
        id: conversation_id,
        name: name.to_owned(),
        is_group,
        created_at,
    })
}

/// Conversation whose member set is exactly `{a, b}`, not a superset.
pub async fn find_one_on_one(
    pool: &SqlitePool,
    a: i64,
    b: i64,
) -> Result<Option<i64>, sqlx::Error> {
    let row: Option<(i64,)> = sqlx::query_as(
        "SELECT m.conversation_id FROM conversation_members m \
         GROUP BY m.conversation_id \
         HAVING COUNT(*) = 2 AND SUM(m.user_id = ?) = 1 AND SUM(m.user_id = ?) = 1 \
         LIMIT 1",
    )
    .bind(a)
    .bind(b)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|(id,)| id))
}

pub async fn is_member(
    pool: &SqlitePool,
    user_id: i64,
    conversation_id: i64,
) -> Result<bool, sqlx::Error> {
    Ok(sqlx::query_as::<_, (i64,)>(
        "SELECT 1 FROM conversation_members WHERE user_id=? AND conversation_id=?",
    )
    .bind(user_id)
    .bind(conversation_id)
    .fetch_optional(pool)
    .await?
    .is_some())
}

pub async fn member_ids(
    pool: &SqlitePool,
    conversation_id: i64,
) -> Result<Vec<i64>, sqlx::Error> {
    let rows: Vec<(i64,)> = sqlx::query_as(
        "SELECT user_id FROM conversation_members WHERE conversation_id=? ORDER BY user_id",
    )
    .bind(conversation_id)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(|(id,)| id).collect())
}

pub async fn members_with_names(
    pool: &SqlitePool,
    conversation_id: i64,
) -> Result<Vec<User>, sqlx::Error> {
    sqlx::query_as(
        "SELECT u.id, u.username FROM conversation_members m \
         JOIN users u ON u.id = m.user_id \
         WHERE m.conversation_id=? ORDER BY u.id",
    )
    .bind(conversation_id)
    .fetch_all(pool)
    .await
}

pub async fn conversations_of(
    pool: &SqlitePool,
    user_id: i64,
) -> Result<Vec<Conversation>, sqlx::Error> {
    sqlx::query_as(
        "SELECT c.id, c.name, c.is_group, c.created_at FROM conversations c \
         JOIN conversation_members m ON m.conversation_id = c.id \
         WHERE m.user_id=? ORDER BY c.id",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await
}

pub async fn append_message(
    pool: &SqlitePool,
    conversation_id: i64,
    sender_id: i64,
    content: &str,
    sent_at: i64,
) -> Result<Message, sqlx::Error> {
    let res = sqlx::query(
        "INSERT INTO messages (conversation_id,sender_id,content,sent_at) VALUES (?,?,?,?)",
    )
    .bind(conversation_id)
    .bind(sender_id)
    .bind(content)
    .bind(sent_at)
    .execute(pool)
    .await?;

    Ok(Message {
        id: res.last_insert_rowid(),
        conversation_id,
        sender_id,
        content: content.to_owned(),
        sent_at,
    })
}

pub async fn query_messages(
    pool: &SqlitePool,
    conversation_id: i64,
    skip: i64,
    take: i64,
) -> Result<Vec<Message>, sqlx::Error> {
    sqlx::query_as(
        "SELECT id, conversation_id, sender_id, content, sent_at FROM messages \
         WHERE conversation_id=? ORDER BY sent_at, id LIMIT ? OFFSET ?",
    )
    .bind(conversation_id)
    .bind(take)
    .bind(skip)
    .fetch_all(pool)
    .await
}

pub async fn last_message(
    pool: &SqlitePool,
    conversation_id: i64,
) -> Result<Option<Message>, sqlx::Error> {
    sqlx::query_as(
        "SELECT id, conversation_id, sender_id, content, sent_at FROM messages \
         WHERE conversation_id=? ORDER BY sent_at DESC, id DESC LIMIT 1",
    )
    .bind(conversation_id)
    .fetch_optional(pool)
    .await
}

pub async fn contacts_of(pool: &SqlitePool, owner_id: i64) -> Result<Vec<Contact>, sqlx::Error> {
    sqlx::query_as(
        "SELECT c.contact_user_id, u.username, c.created_at FROM contacts c \
         JOIN users u ON u.id = c.contact_user_id \
         WHERE c.owner_user_id=? ORDER BY c.created_at DESC",
    )
    .bind(owner_id)
    .fetch_all(pool)
    .await
}

/// Users matching `query`, excluding the owner and anyone already in the
/// owner's contact list.
pub async fn search_users(
    pool: &SqlitePool,
    owner_id: i64,
    query: &str,
) -> Result<Vec<User>, sqlx::Error> {
    sqlx::query_as(
        "SELECT id, username FROM users \
         WHERE id != ? \
           AND lower(username) LIKE '%' || lower(?) || '%' \
           AND id NOT IN (SELECT contact_user_id FROM contacts WHERE owner_user_id=?) \
         ORDER BY username LIMIT 20",
    )
    .bind(owner_id)
    .bind(query)
    .bind(owner_id)
    .fetch_all(pool)
    .await
}

/// Returns false when the directed pair already exists.
pub async fn add_contact(
    pool: &SqlitePool,
    owner_id: i64,
    contact_user_id: i64,
    created_at: i64,
) -> Result<bool, sqlx::Error> {
    let res = sqlx::query(
        "INSERT OR IGNORE INTO contacts (owner_user_id,contact_user_id,created_at) VALUES (?,?,?)",
    )
    .bind(owner_id)
    .bind(contact_user_id)
    .bind(created_at)
    .execute(pool)
    .await?;

    Ok(res.rows_affected() > 0)
}
