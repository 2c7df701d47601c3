//! # CRUD Walkthrough
//!
//! Purpose: Run the same create → read → update → read → delete → read
//! sequence for `user:1` over either client and print each step.
//!
//! The REST run replaces the whole record on update; the WebSocket run sends
//! a partial update, so the service merges the changed field.

use anyhow::{bail, ensure, Context, Result};
use hpkv_client::{ClientConfig, RecordValue, RestClient, WsClient};
use serde::{Deserialize, Serialize};
use tracing::info;

const DEMO_KEY: &str = "user:1";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub name: String,
    pub email: String,
    pub age: u32,
}

impl User {
    fn sample() -> Self {
        User {
            name: "John Doe".to_string(),
            email: "john@example.com".to_string(),
            age: 30,
        }
    }
}

fn step(index: usize, title: &str) {
    println!("\n{}. {}...", index, title);
}

fn show(user: &User) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(user)?);
    Ok(())
}

pub fn run_rest(client: &RestClient) -> Result<()> {
    let mut user = User::sample();

    step(1, "Creating a new user record");
    ensure!(
        client.create(DEMO_KEY, RecordValue::json(&user)?),
        "create operation failed"
    );
    println!("Create operation succeeded");

    step(2, "Reading the user record");
    let stored: User = client.read_as(DEMO_KEY).context("record missing after create")?;
    show(&stored)?;

    step(3, "Updating the user's age");
    user.age = 31;
    ensure!(
        client.update(DEMO_KEY, RecordValue::json(&user)?, false),
        "update operation failed"
    );
    println!("Update operation succeeded");

    step(4, "Reading the updated user record");
    let stored: User = client.read_as(DEMO_KEY).context("record missing after update")?;
    show(&stored)?;

    step(5, "Deleting the user record");
    ensure!(client.delete(DEMO_KEY), "delete operation failed");
    println!("Delete operation succeeded");

    step(6, "Trying to read the deleted record");
    if let Some(value) = client.read(DEMO_KEY) {
        bail!("record still present after delete: {}", value);
    }
    println!("Record not found (as expected)");

    info!(key = DEMO_KEY, "rest walkthrough finished");
    Ok(())
}

pub async fn run_ws(config: &ClientConfig) -> Result<()> {
    let client = WsClient::connect(config)
        .await
        .context("failed to open websocket connection")?;
    let mut user = User::sample();

    step(1, "Creating a new user record");
    ensure!(
        client.create(DEMO_KEY, RecordValue::json(&user)?).await,
        "create operation failed"
    );
    println!("Create operation succeeded");

    step(2, "Reading the user record");
    let stored: User = client
        .read_as(DEMO_KEY)
        .await
        .context("record missing after create")?;
    show(&stored)?;

    step(3, "Updating the user's age");
    user.age = 31;
    ensure!(
        client.update(DEMO_KEY, RecordValue::json(&user)?, true).await,
        "update operation failed"
    );
    println!("Update operation succeeded");

    step(4, "Reading the updated user record");
    let stored: User = client
        .read_as(DEMO_KEY)
        .await
        .context("record missing after update")?;
    show(&stored)?;

    step(5, "Deleting the user record");
    ensure!(client.delete(DEMO_KEY).await, "delete operation failed");
    println!("Delete operation succeeded");

    step(6, "Trying to read the deleted record");
    if let Some(value) = client.read(DEMO_KEY).await {
        bail!("record still present after delete: {}", value);
    }
    println!("Record not found (as expected)");

    client.close().await?;
    info!(key = DEMO_KEY, "websocket walkthrough finished");
    Ok(())
}
