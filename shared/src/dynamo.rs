use async_trait::async_trait;
use aws_sdk_dynamodb::error::DisplayErrorContext;
use aws_sdk_dynamodb::operation::scan::builders::ScanFluentBuilder;
use aws_sdk_dynamodb::types::{AttributeValue, ReturnValue};
use aws_sdk_dynamodb::Client as DynamoClient;
use std::collections::HashMap;

use crate::table::{now_timestamp, sort_newest_first, TableError, UserTable};
use crate::types::{Role, Status, User, UserDraft, UserPatch};

const ENTITY_TYPE: &str = "user";

type Item = HashMap<String, AttributeValue>;

/// The `users` collection stored in DynamoDB.
///
/// Rows use the single-table layout PK = SK = `USER#{id}` and carry
/// `entity_type = "user"` so a filtered scan finds them.
#[derive(Clone, Debug)]
pub struct DynamoUserTable {
    client: DynamoClient,
    table_name: String,
}

impl DynamoUserTable {
    pub fn new(client: DynamoClient, table_name: impl Into<String>) -> Self {
        Self {
            client,
            table_name: table_name.into(),
        }
    }
}

impl DynamoUserTable {
    /// One page of the users scan. Strongly consistent so a refresh right
    /// after a write sees it.
    fn scan_page(&self, start_key: Option<Item>) -> ScanFluentBuilder {
        self.client
            .scan()
            .table_name(&self.table_name)
            .filter_expression("entity_type = :type")
            .expression_attribute_values(":type", AttributeValue::S(ENTITY_TYPE.to_string()))
            .consistent_read(true)
            .set_exclusive_start_key(start_key)
    }
}

#[async_trait]
impl UserTable for DynamoUserTable {
    async fn list(&self) -> Result<Vec<User>, TableError> {
        let mut users = Vec::new();
        let mut start_key: Option<Item> = None;

        loop {
            let resp = self
                .scan_page(start_key.take())
                .send()
                .await
                .map_err(|e| backend_error("scan", e))?;

            for item in resp.items() {
                users.push(user_from_item(item)?);
            }

            match resp.last_evaluated_key() {
                Some(key) if !key.is_empty() => start_key = Some(key.clone()),
                _ => break,
            }
        }

        sort_newest_first(&mut users);
        tracing::info!("Listed {} users from {}", users.len(), self.table_name);
        Ok(users)
    }

    async fn insert(&self, draft: UserDraft) -> Result<User, TableError> {
        let draft = draft.normalize()?;

        let now = now_timestamp();
        let user = User {
            id: uuid::Uuid::new_v4().to_string(),
            name: draft.name,
            email: draft.email,
            role: draft.role,
            department: draft.department,
            status: draft.status.unwrap_or_default(),
            avatar: draft.avatar,
            created_at: now.clone(),
            updated_at: now,
        };

        self.client
            .put_item()
            .table_name(&self.table_name)
            .set_item(Some(user_to_item(&user)))
            .condition_expression("attribute_not_exists(PK)")
            .send()
            .await
            .map_err(|e| backend_error("put_item", e))?;

        tracing::info!("User created: {}", user.id);
        Ok(user)
    }

    async fn update(&self, id: &str, patch: UserPatch) -> Result<User, TableError> {
        let patch = patch.normalize()?;

        let pk = user_pk(id);
        let expr = UpdateExpr::from_patch(&patch, now_timestamp());

        let mut builder = self
            .client
            .update_item()
            .table_name(&self.table_name)
            .key("PK", AttributeValue::S(pk.clone()))
            .key("SK", AttributeValue::S(pk))
            .update_expression(expr.expression())
            .condition_expression("attribute_exists(PK)")
            .return_values(ReturnValue::AllNew);

        for (k, v) in expr.names {
            builder = builder.expression_attribute_names(k, v);
        }

        for (k, v) in expr.values {
            builder = builder.expression_attribute_values(k, v);
        }

        let resp = match builder.send().await {
            Ok(resp) => resp,
            Err(err) => {
                let missing = err
                    .as_service_error()
                    .map(|e| e.is_conditional_check_failed_exception())
                    .unwrap_or(false);
                if missing {
                    return Err(TableError::NotFound { id: id.to_string() });
                }
                return Err(backend_error("update_item", err));
            }
        };

        let item = resp
            .attributes()
            .ok_or_else(|| TableError::Decode(format!("update of {} returned no attributes", id)))?;
        let user = user_from_item(item)?;

        tracing::info!("User updated: {}", id);
        Ok(user)
    }

    async fn delete(&self, id: &str) -> Result<(), TableError> {
        let pk = user_pk(id);

        self.client
            .delete_item()
            .table_name(&self.table_name)
            .key("PK", AttributeValue::S(pk.clone()))
            .key("SK", AttributeValue::S(pk))
            .send()
            .await
            .map_err(|e| backend_error("delete_item", e))?;

        tracing::info!("User deleted: {}", id);
        Ok(())
    }
}

fn user_pk(id: &str) -> String {
    format!("USER#{}", id)
}

fn backend_error<E>(operation: &str, err: E) -> TableError
where
    E: std::error::Error,
{
    let message = DisplayErrorContext(err).to_string();
    tracing::error!("DynamoDB {} failed: {}", operation, message);
    TableError::Backend(message)
}

/// `SET ...` (and `REMOVE avatar` when the patch clears it) for a partial update.
#[derive(Debug)]
struct UpdateExpr {
    set: Vec<&'static str>,
    remove: Vec<&'static str>,
    names: HashMap<String, String>,
    values: HashMap<String, AttributeValue>,
}

impl UpdateExpr {
    fn from_patch(patch: &UserPatch, updated_at: String) -> Self {
        let mut expr = Self {
            set: Vec::new(),
            remove: Vec::new(),
            names: HashMap::new(),
            values: HashMap::new(),
        };

        if let Some(name) = &patch.name {
            expr.set_field("#name = :name", "name", AttributeValue::S(name.clone()));
        }
        if let Some(email) = &patch.email {
            expr.set_field("#email = :email", "email", AttributeValue::S(email.clone()));
        }
        if let Some(role) = patch.role {
            expr.set_field("#role = :role", "role", AttributeValue::S(role.to_string()));
        }
        if let Some(department) = &patch.department {
            expr.set_field(
                "#department = :department",
                "department",
                AttributeValue::S(department.clone()),
            );
        }
        if let Some(status) = patch.status {
            expr.set_field("#status = :status", "status", AttributeValue::S(status.to_string()));
        }
        match &patch.avatar {
            Some(Some(avatar)) => {
                expr.set_field("#avatar = :avatar", "avatar", AttributeValue::S(avatar.clone()));
            }
            Some(None) => {
                expr.remove.push("#avatar");
                expr.names.insert("#avatar".to_string(), "avatar".to_string());
            }
            None => {}
        }
        expr.set_field("updated_at = :updated_at", "updated_at", AttributeValue::S(updated_at));

        expr
    }

    fn set_field(&mut self, clause: &'static str, attr: &str, value: AttributeValue) {
        self.set.push(clause);
        if clause.starts_with('#') {
            self.names.insert(format!("#{}", attr), attr.to_string());
        }
        self.values.insert(format!(":{}", attr), value);
    }

    fn expression(&self) -> String {
        let mut expr = format!("SET {}", self.set.join(", "));
        if !self.remove.is_empty() {
            expr.push_str(&format!(" REMOVE {}", self.remove.join(", ")));
        }
        expr
    }
}

fn user_to_item(user: &User) -> Item {
    let pk = user_pk(&user.id);
    let mut item = HashMap::new();
    item.insert("PK".to_string(), AttributeValue::S(pk.clone()));
    item.insert("SK".to_string(), AttributeValue::S(pk));
    item.insert("entity_type".to_string(), AttributeValue::S(ENTITY_TYPE.to_string()));
    item.insert("id".to_string(), AttributeValue::S(user.id.clone()));
    item.insert("name".to_string(), AttributeValue::S(user.name.clone()));
    item.insert("email".to_string(), AttributeValue::S(user.email.clone()));
    item.insert("role".to_string(), AttributeValue::S(user.role.to_string()));
    item.insert("department".to_string(), AttributeValue::S(user.department.clone()));
    item.insert("status".to_string(), AttributeValue::S(user.status.to_string()));
    if let Some(avatar) = &user.avatar {
        item.insert("avatar".to_string(), AttributeValue::S(avatar.clone()));
    }
    item.insert("created_at".to_string(), AttributeValue::S(user.created_at.clone()));
    item.insert("updated_at".to_string(), AttributeValue::S(user.updated_at.clone()));
    item
}

fn user_from_item(item: &Item) -> Result<User, TableError> {
    let avatar = match item.get("avatar") {
        Some(AttributeValue::S(s)) => Some(s.clone()),
        Some(AttributeValue::Null(_)) | None => None,
        Some(_) => return Err(TableError::Decode("avatar is not a string".to_string())),
    };

    Ok(User {
        id: string_attr(item, "id")?,
        name: string_attr(item, "name")?,
        email: string_attr(item, "email")?,
        role: string_attr(item, "role")?
            .parse::<Role>()
            .map_err(|e: TableError| TableError::Decode(e.message()))?,
        department: string_attr(item, "department")?,
        status: string_attr(item, "status")?
            .parse::<Status>()
            .map_err(|e: TableError| TableError::Decode(e.message()))?,
        avatar,
        created_at: string_attr(item, "created_at")?,
        updated_at: string_attr(item, "updated_at")?,
    })
}

fn string_attr(item: &Item, key: &str) -> Result<String, TableError> {
    item.get(key)
        .and_then(|v| v.as_s().ok())
        .map(|s| s.to_string())
        .ok_or_else(|| TableError::Decode(format!("missing string attribute {}", key)))
}
