use crate::{
  entity::{GENERIC_PC, live_session, platform, user},
  prelude::*,
  sv,
};

pub struct Platform<'a> {
  db: &'a DatabaseConnection,
}

fn normalize(abbreviation: &str) -> Result<String> {
  let abbreviation = abbreviation.trim().to_lowercase();
  if abbreviation.is_empty() {
    return Err(Error::InvalidArgs("Platform abbreviation is empty".into()));
  }
  Ok(abbreviation)
}

impl<'a> Platform<'a> {
  pub fn new(db: &'a DatabaseConnection) -> Self {
    Self { db }
  }

  pub async fn by_id(&self, id: i32) -> Result<Option<platform::Model>> {
    Ok(platform::Entity::find_by_id(id).one(self.db).await?)
  }

  pub async fn get(&self, id: i32) -> Result<platform::Model> {
    self.by_id(id).await?.ok_or(Error::PlatformNotFound)
  }

  pub async fn by_abbreviation(
    &self,
    abbreviation: &str,
  ) -> Result<Option<platform::Model>> {
    let abbreviation = normalize(abbreviation)?;
    let platform = platform::Entity::find()
      .filter(platform::Column::Abbreviation.eq(abbreviation))
      .one(self.db)
      .await?;
    Ok(platform)
  }

  pub async fn find_or_create(
    &self,
    abbreviation: &str,
  ) -> Result<platform::Model> {
    let abbreviation = normalize(abbreviation)?;
    if let Some(platform) = self.by_abbreviation(&abbreviation).await? {
      return Ok(platform);
    }

    let inserted = platform::ActiveModel {
      abbreviation: Set(abbreviation.clone()),
      name: Set(None),
      ..Default::default()
    }
    .insert(self.db)
    .await;

    match inserted {
      Ok(platform) => {
        info!("Added new platform {} to database", platform.abbreviation);
        Ok(platform)
      }
      // lost a race against a concurrent insert of the same abbreviation
      Err(err) if Error::is_unique_violation(&err) => self
        .by_abbreviation(&abbreviation)
        .await?
        .ok_or(Error::PlatformNotFound),
      Err(err) => Err(err.into()),
    }
  }

  /// Resolves a platform tag for `user`, mapping the generic "pc"
  /// placeholder to the user's OS preference.
  pub async fn for_user(
    &self,
    user: &user::Model,
    abbreviation: &str,
  ) -> Result<platform::Model> {
    if normalize(abbreviation)? == GENERIC_PC {
      self.find_or_create(user.pc_platform.abbreviation()).await
    } else {
      self.find_or_create(abbreviation).await
    }
  }

  pub async fn create(
    &self,
    abbreviation: &str,
    name: Option<String>,
  ) -> Result<platform::Model> {
    let abbreviation = normalize(abbreviation)?;

    let inserted = platform::ActiveModel {
      abbreviation: Set(abbreviation.clone()),
      name: Set(name),
      ..Default::default()
    }
    .insert(self.db)
    .await;

    match inserted {
      Ok(platform) => Ok(platform),
      Err(err) if Error::is_unique_violation(&err) => {
        Err(Error::NameTaken(abbreviation))
      }
      Err(err) => Err(err.into()),
    }
  }

  pub async fn set_name(
    &self,
    id: i32,
    name: Option<String>,
  ) -> Result<platform::Model> {
    let platform = self.get(id).await?;
    let platform = platform::ActiveModel { name: Set(name), ..platform.into() }
      .update(self.db)
      .await?;
    Ok(platform)
  }

  pub async fn all(&self) -> Result<Vec<platform::Model>> {
    let platforms = platform::Entity::find()
      .order_by_asc(platform::Column::Abbreviation)
      .all(self.db)
      .await?;
    Ok(platforms)
  }

  pub async fn delete(&self, id: i32) -> Result<()> {
    let platform = self.get(id).await?;

    let sessions = sv::Session::count_for_platform(self.db, id).await?;
    let live = live_session::Entity::find()
      .filter(live_session::Column::PlatformId.eq(id))
      .count(self.db)
      .await?;
    let defaults = user::Entity::find()
      .filter(user::Column::DefaultPlatformId.eq(id))
      .count(self.db)
      .await?;

    if sessions + live + defaults > 0 {
      return Err(Error::ReferentialConflict(format!(
        "Platform `{}`",
        platform.abbreviation
      )));
    }

    platform::Entity::delete_by_id(id).exec(self.db).await?;
    info!("Deleted platform {}", platform.abbreviation);
    Ok(())
  }
}
