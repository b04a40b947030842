use crate::{Error, LocalStore, Query, RecordKind, RemoteError, Result, User, UserField};

use super::FailoverRouter;

impl<L: LocalStore> FailoverRouter<L> {
    /// Looks a user up by id, then by email.
    pub async fn get_user(&self, identifier: &str) -> Result<Option<User>> {
        self.route(
            "get_user",
            async {
                if let Some(user) = self.remote.find::<User>(identifier).await? {
                    return Ok(Some(user));
                }
                let mut by_email = self
                    .remote
                    .get_by_field::<User>(UserField::Email, identifier)
                    .await?;
                Ok::<_, RemoteError>((!by_email.is_empty()).then(|| by_email.remove(0)))
            },
            |local| {
                if let Some(user) = local.get::<User>(identifier)? {
                    return Ok(Some(user));
                }
                let by_email = local.list::<User>(&Query::all().eq(UserField::Email, identifier))?;
                Ok(by_email.into_iter().next())
            },
        )
        .await
    }

    /// Registers a new user. Fails if the id is already taken remotely.
    pub async fn add_user(&self, user: &User) -> Result<()> {
        self.route("add_user", self.remote.add(user), |local| local.put(user))
            .await
    }

    /// Overwrites a user record.
    pub async fn update_user(&self, user: &User) -> Result<()> {
        self.route("update_user", self.remote.replace(user), |local| {
            local.put(user)
        })
        .await
    }

    /// Updates the login statistics of a user and returns the updated record.
    pub async fn record_login(&self, user_id: &str) -> Result<User> {
        let Some(mut user) = self.get_user(user_id).await? else {
            return Err(Error::NotFound {
                kind: RecordKind::User,
                id: user_id.to_string(),
            });
        };
        user.login_count += 1;
        user.last_login_at = Some(self.now());
        user.is_active = true;
        self.update_user(&user).await?;
        Ok(user)
    }
}
