//! Users: storage, service and the HTTP controller.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use brass::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::info;

#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: u64,
    pub name: String,
    pub email: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewUser {
    pub name: String,
    pub email: String,
}

#[derive(Debug, Error)]
pub enum UserError {
    #[error("user {0} not found")]
    NotFound(u64),

    #[error("invalid user id: {0:?}")]
    InvalidId(String),

    #[error("name must not be empty")]
    EmptyName,
}

// ============================================================================
// Database
// ============================================================================

/// In-memory user table. Connecting takes a moment.
pub struct Database {
    users: RwLock<BTreeMap<u64, User>>,
    next_id: AtomicU64,
}

impl Database {
    pub async fn connect() -> Result<Self, BoxError> {
        tokio::time::sleep(Duration::from_millis(50)).await;

        let seed = User {
            id: 1,
            name: "Ada".to_string(),
            email: "ada@example.com".to_string(),
        };
        info!("Database connected");
        Ok(Self {
            users: RwLock::new(BTreeMap::from([(seed.id, seed)])),
            next_id: AtomicU64::new(2),
        })
    }
}

// ============================================================================
// Service
// ============================================================================

pub struct UserService {
    db: Arc<Database>,
}

impl UserService {
    pub async fn list(&self, name: Option<&str>) -> Vec<User> {
        self.db
            .users
            .read()
            .await
            .values()
            .filter(|user| name.is_none_or(|name| user.name.eq_ignore_ascii_case(name)))
            .cloned()
            .collect()
    }

    pub async fn find(&self, id: u64) -> Result<User, UserError> {
        self.db
            .users
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(UserError::NotFound(id))
    }

    pub async fn create(&self, new: NewUser) -> Result<User, UserError> {
        if new.name.trim().is_empty() {
            return Err(UserError::EmptyName);
        }

        let user = User {
            id: self.db.next_id.fetch_add(1, Ordering::Relaxed),
            name: new.name,
            email: new.email,
        };
        self.db.users.write().await.insert(user.id, user.clone());
        info!(id = user.id, "User created");
        Ok(user)
    }

    pub async fn remove(&self, id: u64) -> Result<User, UserError> {
        self.db
            .users
            .write()
            .await
            .remove(&id)
            .ok_or(UserError::NotFound(id))
    }
}

// ============================================================================
// Controller
// ============================================================================

pub struct UserController {
    users: Arc<UserService>,
}

fn parse_id(raw: &str) -> Result<u64, UserError> {
    raw.parse().map_err(|_| UserError::InvalidId(raw.to_string()))
}

/// Declares the database, the service and the `/users` controller.
pub fn declare(registry: &Registry) -> Result<(), BoxError> {
    let injector = registry.injector();
    injector.declare_async::<Database, _, _>([], |_| Database::connect())?;
    injector.declare_constructor::<UserService, _>([Target::of::<Database>()], |deps| {
        Ok(UserService { db: deps.get(0)? })
    })?;

    registry.controllers().declare_controller::<UserController, _>(
        "/users",
        [Target::of::<UserService>()],
        |deps| Ok(UserController { users: deps.get(0)? }),
    )?;

    let methods = registry.methods();
    methods.bind::<UserController, _, _, _>(
        "list",
        MethodOptions::get("/").params([query("name")]),
        |controller, params| async move {
            let name = params.take::<Option<String>>(0)?;
            Ok::<_, BoxError>(controller.users.list(name.as_deref()).await)
        },
    )?;

    methods.bind::<UserController, _, _, _>(
        "find",
        MethodOptions::get("/:id").params([param("id")]),
        |controller, params| async move {
            let id = parse_id(&params.take::<String>(0)?)?;
            Ok::<_, BoxError>(controller.users.find(id).await?)
        },
    )?;

    methods.bind::<UserController, _, _, _>(
        "create",
        MethodOptions::post("/").params([json_body::<NewUser>(), context()]),
        |controller, params| async move {
            let user = controller.users.create(params.take::<NewUser>(0)?).await?;
            params
                .get::<ExecutionContext>(1)?
                .set_status(http::StatusCode::CREATED);
            Ok::<_, BoxError>(user)
        },
    )?;

    let remove = methods.bind::<UserController, _, _, _>(
        "remove",
        MethodOptions::delete("/:id").params([param("id")]),
        |controller, params| async move {
            let id = parse_id(&params.take::<String>(0)?)?;
            Ok::<_, BoxError>(controller.users.remove(id).await?)
        },
    )?;
    registry.tags().set(remove, "requires_auth", true);

    Ok(())
}
