use std::sync::Arc;

use teloxide::{prelude::*, utils::command::BotCommands, utils::html};

use super::ReplyBot;
use crate::{
  entity::{PcPlatform, game, session, user},
  prelude::*,
  state::{AppState, Services},
  sv::Stopped,
};

/// Sessions listed by `/last` at most.
const MAX_LAST: u64 = 10;

#[derive(BotCommands, Clone, Debug, PartialEq)]
#[command(rename_rule = "snake_case")]
pub enum Command {
  /// Show available commands
  Help,
  /// Start a live session: /start_game <game id|name> [@when]
  StartGame(String),
  /// Stop and save the live session
  Stop,
  /// Time elapsed in the live session
  Time,
  /// Discard the live session
  Abort,
  /// Add a finished session, creating an unknown game:
  /// /add <game id|name> <duration> [@when]
  Add(String),
  /// Your latest sessions: /last [n]
  Last(String),
  /// Show or set your PC platform: /pcp [win|mac|linux]
  Pcp(String),
  /// Show or set your default platform: /platform [abbr]
  Platform(String),
  /// List platforms
  Platforms,
  /// Toggle the emulated flag: /emulated <session id>
  Emulated(String),
  /// Remove one of your sessions: /remove <session id>
  Remove(String),

  // Admin commands below
  #[command(hide)]
  AddGame(String),
  #[command(hide)]
  AddPlatform(String),
  #[command(hide)]
  DelPlatform(String),
  #[command(hide)]
  PlatformName(String),
  #[command(hide)]
  Alias(String),
  #[command(hide)]
  Unalias(String),
  #[command(hide)]
  DelGame(String),
  #[command(hide)]
  Year(String),
  #[command(hide)]
  SteamId(String),
  #[command(hide)]
  SgdbId(String),
  #[command(hide)]
  Block(String),
}

impl Command {
  fn admin_only(&self) -> bool {
    matches!(
      self,
      Command::AddGame(_)
        | Command::AddPlatform(_)
        | Command::DelPlatform(_)
        | Command::PlatformName(_)
        | Command::Alias(_)
        | Command::Unalias(_)
        | Command::DelGame(_)
        | Command::Year(_)
        | Command::SteamId(_)
        | Command::SgdbId(_)
        | Command::Block(_)
    )
  }
}

const ADMIN_HELP: &str = "\
<b>Admin Commands</b>

<b>Platforms:</b>
/add_platform &lt;abbr&gt; [name] - Add a platform
/del_platform &lt;id&gt; - Delete an unused platform
/platform_name &lt;id&gt; [name] - Set or clear the display name

<b>Games:</b>
/add_game &lt;name&gt; - Add a game
/alias &lt;game id&gt; &lt;alias&gt; - Add a game alias
/unalias &lt;alias&gt; - Remove a game alias
/del_game &lt;id&gt; - Delete an unplayed game
/year &lt;game id&gt; &lt;year|none&gt; - Set the release year
/steam_id &lt;game id&gt; &lt;id|none&gt; - Set the Steam app id
/sgdb_id &lt;game id&gt; &lt;id|none&gt; - Set the SteamGridDB id

<b>Users:</b>
/block &lt;user id&gt; [on|off] - Show or set the command block";

pub async fn handle(
  app: Arc<AppState>,
  bot: ReplyBot,
  cmd: Command,
) -> ResponseResult<()> {
  let registered =
    app.sv().user.get_or_create(&bot.user_id, &bot.user_name).await;
  let user = match registered {
    Ok(user) => user,
    Err(err) => {
      error!("Failed to register user {}: {}", bot.user_id, err);
      bot.reply_html(format!("❌ {}", err.user_message())).await?;
      return Ok(());
    }
  };

  if !permitted(&app, &user, &cmd) {
    debug!("Ignoring {:?} from user {}", cmd, user.id);
    return Ok(());
  }

  let text = match execute(&app, &user, cmd).await {
    Ok(text) => text,
    Err(err) => format!("❌ {}", html::escape(&err.user_message())),
  };
  bot.reply_html(text).await?;

  Ok(())
}

/// Blocked users and non-admins invoking admin commands are ignored.
fn permitted(app: &AppState, user: &user::Model, cmd: &Command) -> bool {
  if app.is_admin(&user.id) {
    return true;
  }
  !user.commands_blocked && !cmd.admin_only()
}

fn usage(text: &str) -> Error {
  Error::InvalidArgs(format!("Usage: {text}"))
}

fn parse_id(input: &str, text: &str) -> Result<i32> {
  input.trim().parse().map_err(|_| usage(text))
}

/// Splits off the first word, returning it and the trimmed rest.
fn split_first(input: &str) -> (&str, &str) {
  let input = input.trim();
  match input.split_once(char::is_whitespace) {
    Some((head, rest)) => (head, rest.trim()),
    None => (input, ""),
  }
}

/// `none` clears an optional value.
fn parse_optional<T: std::str::FromStr>(
  input: &str,
  text: &str,
) -> Result<Option<T>> {
  match input.trim() {
    "none" => Ok(None),
    value => value.parse().map(Some).map_err(|_| usage(text)),
  }
}

/// Splits off a trailing `@when` word, an RFC 3339 instant or a time
/// relative to now such as `@-1h30m`. An `@` inside a word is left alone.
fn split_when<'a>(
  input: &'a str,
  text: &str,
) -> Result<(&'a str, Option<DateTime>)> {
  let input = input.trim();
  let (rest, last) = match input.rsplit_once(char::is_whitespace) {
    Some((rest, last)) => (rest.trim(), last),
    None => ("", input),
  };
  match last.strip_prefix('@') {
    Some(when) => {
      let when = utils::parse_timestamp(when).ok_or_else(|| usage(text))?;
      Ok((rest, Some(when)))
    }
    None => Ok((input, None)),
  }
}

fn or_none<T: std::fmt::Display>(value: Option<T>) -> String {
  value.map_or_else(|| "none".to_string(), |v| v.to_string())
}

/// Resolves a game by id, exact name or alias. Never creates one.
async fn find_game(sv: &Services<'_>, input: &str) -> Result<game::Model> {
  let input = input.trim();
  if input.is_empty() {
    return Err(Error::InvalidArgs("Game is missing".into()));
  }
  match input.parse::<i32>() {
    Ok(id) => sv.game.get(id).await,
    Err(_) => {
      sv.game.by_name_or_alias(input).await?.ok_or(Error::GameNotFound)
    }
  }
}

async fn describe(
  sv: &Services<'_>,
  session: &session::Model,
) -> Result<String> {
  let game = sv.game.get(session.game_id).await?;
  let platform = sv.platform.get(session.platform_id).await?;
  Ok(format!(
    "#{} {} UTC <b>{}</b> ({}){} {}",
    session.id,
    utils::format_date(session.timestamp),
    html::escape(&game.name),
    platform.abbreviation,
    if session.emulated { " (emu)" } else { "" },
    utils::format_duration(session.seconds)
  ))
}

async fn execute(
  app: &AppState,
  user: &user::Model,
  cmd: Command,
) -> Result<String> {
  let sv = app.sv();

  match cmd {
    Command::Help => {
      let mut text = html::escape(&Command::descriptions().to_string());
      if app.is_admin(&user.id) {
        text.push_str("\n\n");
        text.push_str(ADMIN_HELP);
      }
      Ok(text)
    }

    Command::StartGame(args) => {
      let (game, started) =
        split_when(&args, "/start_game <game id|name> [@when]")?;
      let game = find_game(&sv, game).await?;
      let live = sv.live.start(user, &game, None, started).await?;
      let platform = sv.platform.get(live.platform_id).await?;
      Ok(format!(
        "▶️ Started <b>{}</b> on {}",
        html::escape(&game.name),
        platform.abbreviation
      ))
    }

    Command::Stop => match sv.live.stop(user).await? {
      Stopped::Saved(session) => {
        Ok(format!("⏹ Saved:\n{}", describe(&sv, &session).await?))
      }
      Stopped::TooShort { seconds } => Ok(format!(
        "⏹ Stopped after {}, not saved (minimum is {})",
        utils::format_duration(seconds),
        utils::format_duration(app.config.min_session_secs)
      )),
    },

    Command::Time => {
      let elapsed = sv.live.elapsed(&user.id).await?;
      let live =
        sv.live.current(&user.id).await?.ok_or(Error::NoActiveSession)?;
      let game = sv.game.get(live.game_id).await?;
      Ok(format!(
        "⏱ <b>{}</b>: {}",
        html::escape(&game.name),
        utils::format_duration(elapsed)
      ))
    }

    Command::Abort => {
      let live = sv.live.abort(&user.id).await?;
      let game = sv.game.get(live.game_id).await?;
      Ok(format!("🗑 Discarded <b>{}</b>", html::escape(&game.name)))
    }

    Command::Add(args) => {
      const USAGE: &str = "/add <game id|name> <duration> [@when]";
      let (args, ended) = split_when(&args, USAGE)?;
      let (game, duration) = args
        .rsplit_once(char::is_whitespace)
        .ok_or_else(|| usage(USAGE))?;
      let seconds =
        utils::parse_duration(duration).ok_or_else(|| usage(USAGE))?;

      let game = match game.trim().parse::<i32>() {
        Ok(id) => sv.game.get(id).await?,
        Err(_) => sv.game.resolve(game).await?,
      };
      let session =
        sv.session.commit(user, &game, seconds, None, ended).await?;
      Ok(format!("✅ Added:\n{}", describe(&sv, &session).await?))
    }

    Command::Last(args) => {
      let amount = match args.trim() {
        "" => 1,
        n => n.parse::<u64>().map_err(|_| usage("/last [n]"))?,
      };
      let sessions =
        sv.session.recent(&user.id, amount.clamp(1, MAX_LAST)).await?;
      if sessions.is_empty() {
        return Ok("📭 No sessions yet".into());
      }

      let mut lines = Vec::with_capacity(sessions.len());
      for session in &sessions {
        lines.push(describe(&sv, session).await?);
      }
      Ok(lines.join("\n"))
    }

    Command::Pcp(args) => {
      let user = match args.trim() {
        "" => user.clone(),
        value => {
          let pcp: PcPlatform = value.parse().map_err(Error::InvalidArgs)?;
          sv.user.set_pc_platform(&user.id, pcp).await?
        }
      };
      Ok(format!("🖥 PC platform: {}", user.pc_platform))
    }

    Command::Platform(args) => {
      let user = match args.trim() {
        "" => user.clone(),
        abbr => sv.user.set_default_platform(&user.id, abbr).await?,
      };
      let platform = sv.platform.get(user.default_platform_id).await?;
      Ok(format!("🎮 Default platform: {}", platform.abbreviation))
    }

    Command::Platforms => {
      let platforms = sv.platform.all().await?;
      let lines: Vec<String> = platforms
        .iter()
        .map(|p| {
          format!(
            "{:>3}: {} {}",
            p.id,
            p.abbreviation,
            html::escape(p.name.as_deref().unwrap_or_default())
          )
        })
        .collect();
      Ok(format!("<code>{}</code>", lines.join("\n")))
    }

    Command::Emulated(args) => {
      let id = parse_id(&args, "/emulated <session id>")?;
      let session = sv.session.toggle_emulated(&user.id, id).await?;
      Ok(format!("Session {} emulated: {}", session.id, session.emulated))
    }

    Command::Remove(args) => {
      let id = parse_id(&args, "/remove <session id>")?;
      sv.session.remove(&user.id, id).await?;
      Ok(format!("🗑 Session {id} removed"))
    }

    Command::AddGame(name) => {
      if name.trim().is_empty() {
        return Err(usage("/add_game <name>"));
      }
      let game = sv.game.create(&name).await?;
      Ok(format!(
        "✅ Game {} added: <b>{}</b>",
        game.id,
        html::escape(&game.name)
      ))
    }

    Command::AddPlatform(args) => {
      let (abbr, name) = split_first(&args);
      if abbr.is_empty() {
        return Err(usage("/add_platform <abbr> [name]"));
      }
      let name = (!name.is_empty()).then(|| name.to_string());
      let platform = sv.platform.create(abbr, name).await?;
      Ok(format!(
        "✅ Platform {} added: {}",
        platform.id, platform.abbreviation
      ))
    }

    Command::DelPlatform(args) => {
      let id = parse_id(&args, "/del_platform <id>")?;
      sv.platform.delete(id).await?;
      Ok(format!("🗑 Platform {id} deleted"))
    }

    Command::PlatformName(args) => {
      let (id, name) = split_first(&args);
      let id = parse_id(id, "/platform_name <id> [name]")?;
      let name = (!name.is_empty()).then(|| name.to_string());
      let platform = sv.platform.set_name(id, name).await?;
      Ok(format!(
        "✅ Platform {} ({}) name: {}",
        platform.id,
        platform.abbreviation,
        html::escape(platform.name.as_deref().unwrap_or("none"))
      ))
    }

    Command::Alias(args) => {
      const USAGE: &str = "/alias <game id> <alias>";
      let (id, alias) = split_first(&args);
      let id = parse_id(id, USAGE)?;
      if alias.is_empty() {
        return Err(usage(USAGE));
      }
      sv.game.add_alias(id, alias).await?;
      let aliases = sv.game.aliases(id).await?;
      Ok(format!(
        "✅ Aliases of game {id}: {}",
        html::escape(&aliases.join(", "))
      ))
    }

    Command::Unalias(args) => {
      if args.trim().is_empty() {
        return Err(usage("/unalias <alias>"));
      }
      let game = sv.game.remove_alias(&args).await?;
      Ok(format!(
        "🗑 Alias removed from <b>{}</b>",
        html::escape(&game.name)
      ))
    }

    Command::DelGame(args) => {
      let id = parse_id(&args, "/del_game <id>")?;
      sv.game.delete(id).await?;
      Ok(format!("🗑 Game {id} deleted"))
    }

    Command::Year(args) => {
      const USAGE: &str = "/year <game id> <year|none>";
      let (id, year) = split_first(&args);
      let id = parse_id(id, USAGE)?;
      let year = parse_optional(year, USAGE)?;
      let game = sv.game.set_release_year(id, year).await?;
      Ok(format!(
        "✅ {}: release year {}",
        html::escape(&game.name),
        or_none(game.release_year)
      ))
    }

    Command::SteamId(args) => {
      const USAGE: &str = "/steam_id <game id> <id|none>";
      let (id, steam_id) = split_first(&args);
      let id = parse_id(id, USAGE)?;
      let steam_id = parse_optional(steam_id, USAGE)?;
      let game = sv.game.set_steam_id(id, steam_id).await?;
      Ok(format!(
        "✅ {}: Steam id {}",
        html::escape(&game.name),
        or_none(game.steam_id)
      ))
    }

    Command::SgdbId(args) => {
      const USAGE: &str = "/sgdb_id <game id> <id|none>";
      let (id, sgdb_id) = split_first(&args);
      let id = parse_id(id, USAGE)?;
      let sgdb_id = parse_optional(sgdb_id, USAGE)?;
      let game = sv.game.set_sgdb_id(id, sgdb_id).await?;
      Ok(format!(
        "✅ {}: SteamGridDB id {}",
        html::escape(&game.name),
        or_none(game.sgdb_id)
      ))
    }

    Command::Block(args) => {
      let (id, state) = split_first(&args);
      if id.is_empty() {
        return Err(usage("/block <user id> [on|off]"));
      }
      let target = match state.to_lowercase().as_str() {
        "" => sv.user.get(id).await?,
        "on" => sv.user.set_blocked(id, true).await?,
        "off" => sv.user.set_blocked(id, false).await?,
        _ => return Err(usage("/block <user id> [on|off]")),
      };
      Ok(format!(
        "{} blocked from commands: {}",
        html::escape(&target.name),
        target.commands_blocked
      ))
    }
  }
}
