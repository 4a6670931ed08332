use crate::{
  entity::{game, game_alias, live_session},
  prelude::*,
  sv,
};

/// Cosmetic suffixes some trackers append to the game name.
const COSMETIC_SUFFIXES: &[&str] = &[" with Medal"];

/// Strips cosmetic suffixes and surrounding whitespace from a reported game
/// name.
pub fn normalize_name(name: &str) -> String {
  let mut name = name.trim();
  for suffix in COSMETIC_SUFFIXES {
    name = name.strip_suffix(suffix).unwrap_or(name).trim();
  }
  name.to_string()
}

fn validate(name: &str) -> Result<&str> {
  let name = name.trim();
  if name.is_empty() {
    return Err(Error::InvalidArgs("Game name is empty".into()));
  }
  Ok(name)
}

pub struct Game<'a> {
  db: &'a DatabaseConnection,
}

impl<'a> Game<'a> {
  pub fn new(db: &'a DatabaseConnection) -> Self {
    Self { db }
  }

  pub async fn by_id(&self, id: i32) -> Result<Option<game::Model>> {
    Ok(game::Entity::find_by_id(id).one(self.db).await?)
  }

  pub async fn get(&self, id: i32) -> Result<game::Model> {
    self.by_id(id).await?.ok_or(Error::GameNotFound)
  }

  pub async fn by_name(&self, name: &str) -> Result<Option<game::Model>> {
    let game = game::Entity::find()
      .filter(game::Column::Name.eq(name.trim()))
      .one(self.db)
      .await?;
    Ok(game)
  }

  /// Aliases match exactly, including case.
  pub async fn by_alias(&self, alias: &str) -> Result<Option<game::Model>> {
    let found = game_alias::Entity::find()
      .filter(game_alias::Column::Alias.eq(alias.trim()))
      .find_also_related(game::Entity)
      .one(self.db)
      .await?;
    Ok(found.and_then(|(_, game)| game))
  }

  pub async fn by_name_or_alias(
    &self,
    name: &str,
  ) -> Result<Option<game::Model>> {
    if let Some(game) = self.by_name(name).await? {
      return Ok(Some(game));
    }
    self.by_alias(name).await
  }

  /// Creates a game. The name may collide with neither an existing name nor
  /// an existing alias.
  pub async fn create(&self, name: &str) -> Result<game::Model> {
    let name = validate(name)?;
    if self.by_alias(name).await?.is_some() {
      return Err(Error::NameTaken(name.to_string()));
    }

    let inserted = game::ActiveModel {
      name: Set(name.to_string()),
      steam_id: Set(None),
      sgdb_id: Set(None),
      release_year: Set(None),
      ..Default::default()
    }
    .insert(self.db)
    .await;

    match inserted {
      Ok(game) => {
        info!("Added new game {} to database", game.name);
        Ok(game)
      }
      Err(err) if Error::is_unique_violation(&err) => {
        Err(Error::NameTaken(name.to_string()))
      }
      Err(err) => Err(err.into()),
    }
  }

  pub async fn find_or_create(&self, name: &str) -> Result<game::Model> {
    let name = validate(name)?;
    if let Some(game) = self.by_name(name).await? {
      return Ok(game);
    }

    match self.create(name).await {
      // created concurrently, under either key
      Err(Error::NameTaken(_)) => {
        self.by_name_or_alias(name).await?.ok_or(Error::GameNotFound)
      }
      other => other,
    }
  }

  /// Maps a reported name to a game: exact name, then alias, then a newly
  /// created game.
  pub async fn resolve(&self, name: &str) -> Result<game::Model> {
    let name = validate(name)?;
    if let Some(game) = self.by_name_or_alias(name).await? {
      return Ok(game);
    }

    info!("Did not find game {} by name or alias, creating...", name);
    self.find_or_create(name).await
  }

  pub async fn aliases(&self, id: i32) -> Result<Vec<String>> {
    let aliases = game_alias::Entity::find()
      .filter(game_alias::Column::GameId.eq(id))
      .order_by_asc(game_alias::Column::Alias)
      .all(self.db)
      .await?;
    Ok(aliases.into_iter().map(|a| a.alias).collect())
  }

  pub async fn add_alias(
    &self,
    id: i32,
    alias: &str,
  ) -> Result<game_alias::Model> {
    let game = self.get(id).await?;
    let alias = alias.trim();
    if alias.is_empty() {
      return Err(Error::InvalidArgs("Alias is empty".into()));
    }

    if let Some(owner) = self.by_name_or_alias(alias).await? {
      return Err(Error::AliasTaken { alias: alias.into(), game: owner.name });
    }

    let inserted = game_alias::ActiveModel {
      game_id: Set(game.id),
      alias: Set(alias.to_string()),
      ..Default::default()
    }
    .insert(self.db)
    .await;

    match inserted {
      Ok(alias) => {
        info!("Added alias {} for game {}", alias.alias, game.name);
        Ok(alias)
      }
      Err(err) if Error::is_unique_violation(&err) => {
        let owner = self.by_alias(alias).await?.map(|g| g.name);
        Err(Error::AliasTaken {
          alias: alias.into(),
          game: owner.unwrap_or_default(),
        })
      }
      Err(err) => Err(err.into()),
    }
  }

  /// Removes an alias and returns the game it belonged to.
  pub async fn remove_alias(&self, alias: &str) -> Result<game::Model> {
    let (alias, game) = game_alias::Entity::find()
      .filter(game_alias::Column::Alias.eq(alias.trim()))
      .find_also_related(game::Entity)
      .one(self.db)
      .await?
      .ok_or(Error::GameNotFound)?;

    game_alias::Entity::delete_by_id(alias.id).exec(self.db).await?;
    game.ok_or(Error::GameNotFound)
  }

  pub async fn set_release_year(
    &self,
    id: i32,
    year: Option<i32>,
  ) -> Result<game::Model> {
    let game = self.get(id).await?;
    let game = game::ActiveModel { release_year: Set(year), ..game.into() }
      .update(self.db)
      .await?;
    Ok(game)
  }

  pub async fn set_steam_id(
    &self,
    id: i32,
    steam_id: Option<i64>,
  ) -> Result<game::Model> {
    let game = self.get(id).await?;
    let game = game::ActiveModel { steam_id: Set(steam_id), ..game.into() }
      .update(self.db)
      .await?;
    Ok(game)
  }

  pub async fn set_sgdb_id(
    &self,
    id: i32,
    sgdb_id: Option<i64>,
  ) -> Result<game::Model> {
    let game = self.get(id).await?;
    let game = game::ActiveModel { sgdb_id: Set(sgdb_id), ..game.into() }
      .update(self.db)
      .await?;
    Ok(game)
  }

  pub async fn delete(&self, id: i32) -> Result<()> {
    let game = self.get(id).await?;

    let sessions = sv::Session::count_for_game(self.db, id).await?;
    let live = live_session::Entity::find()
      .filter(live_session::Column::GameId.eq(id))
      .count(self.db)
      .await?;

    if sessions + live > 0 {
      return Err(Error::ReferentialConflict(format!("Game `{}`", game.name)));
    }

    let txn = self.db.begin().await?;
    game_alias::Entity::delete_many()
      .filter(game_alias::Column::GameId.eq(id))
      .exec(&txn)
      .await?;
    game::Entity::delete_by_id(id).exec(&txn).await?;
    txn.commit().await?;

    info!("Deleted game {}", game.name);
    Ok(())
  }
}
