use crate::{
  entity::{GENERIC_PC, PcPlatform, user},
  prelude::*,
  sv,
};

pub struct User<'a> {
  db: &'a DatabaseConnection,
}

impl<'a> User<'a> {
  pub fn new(db: &'a DatabaseConnection) -> Self {
    Self { db }
  }

  /// Fetches the user by external id, creating it with `name` on first
  /// contact. The name of an existing user is left untouched.
  pub async fn get_or_create(
    &self,
    id: &str,
    name: &str,
  ) -> Result<user::Model> {
    if let Some(user) = self.by_id(id).await? {
      return Ok(user);
    }

    let default_platform =
      sv::Platform::new(self.db).find_or_create(GENERIC_PC).await?;

    let inserted = user::ActiveModel {
      id: Set(id.to_string()),
      name: Set(name.to_string()),
      default_platform_id: Set(default_platform.id),
      pc_platform: Set(PcPlatform::default()),
      commands_blocked: Set(false),
      created_at: Set(utils::now()),
    }
    .insert(self.db)
    .await;

    match inserted {
      Ok(user) => {
        info!("Added new user {} ({}) to database", user.name, user.id);
        Ok(user)
      }
      Err(err) if Error::is_unique_violation(&err) => {
        self.by_id(id).await?.ok_or(Error::UserNotFound)
      }
      Err(err) => Err(err.into()),
    }
  }

  pub async fn by_id(&self, id: &str) -> Result<Option<user::Model>> {
    Ok(user::Entity::find_by_id(id).one(self.db).await?)
  }

  pub async fn get(&self, id: &str) -> Result<user::Model> {
    self.by_id(id).await?.ok_or(Error::UserNotFound)
  }

  pub async fn set_default_platform(
    &self,
    id: &str,
    abbreviation: &str,
  ) -> Result<user::Model> {
    let user = self.get(id).await?;
    let platform = sv::Platform::new(self.db)
      .by_abbreviation(abbreviation)
      .await?
      .ok_or(Error::PlatformNotFound)?;

    let user = user::ActiveModel {
      default_platform_id: Set(platform.id),
      ..user.into()
    }
    .update(self.db)
    .await?;
    Ok(user)
  }

  pub async fn set_pc_platform(
    &self,
    id: &str,
    pc_platform: PcPlatform,
  ) -> Result<user::Model> {
    let user = self.get(id).await?;
    let user =
      user::ActiveModel { pc_platform: Set(pc_platform), ..user.into() }
        .update(self.db)
        .await?;
    Ok(user)
  }

  pub async fn set_blocked(
    &self,
    id: &str,
    blocked: bool,
  ) -> Result<user::Model> {
    let user = self.get(id).await?;
    let user =
      user::ActiveModel { commands_blocked: Set(blocked), ..user.into() }
        .update(self.db)
        .await?;
    Ok(user)
  }
}
