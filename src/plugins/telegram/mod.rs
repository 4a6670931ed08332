mod command;

use std::sync::Arc;

use command::Command;
use teloxide::{
  Bot,
  dispatching::{Dispatcher, HandlerExt, UpdateFilterExt},
  prelude::*,
  types::{ChatId, Message, ParseMode, Update},
  utils::command::BotCommands,
};

use crate::{prelude::*, state::AppState};

pub struct Plugin {
  bot: Bot,
}

impl Plugin {
  pub fn new(token: impl Into<String>) -> Self {
    Self { bot: Bot::new(token) }
  }
}

#[async_trait]
impl super::Plugin for Plugin {
  fn name(&self) -> &'static str {
    "telegram"
  }

  async fn start(&self, app: Arc<AppState>) -> anyhow::Result<()> {
    run_bot(app, self.bot.clone()).await;
    Ok(())
  }
}

pub async fn run_bot(app: Arc<AppState>, bot: Bot) {
  info!("Starting Telegram bot...");

  if let Err(err) = bot.set_my_commands(Command::bot_commands()).await {
    warn!("Failed to register bot commands: {}", err);
  }

  let handler = teloxide::dptree::entry().branch(
    Update::filter_message().filter_command::<Command>().endpoint({
      move |bot: Bot, msg: Message, cmd: Command| {
        let app = app.clone();
        async move {
          let Some(bot) = ReplyBot::from_message(bot, &msg) else {
            return Ok(());
          };
          command::handle(app, bot, cmd).await
        }
      }
    }),
  );

  Dispatcher::builder(bot, handler).build().dispatch().await;
}

#[derive(Debug, Clone)]
struct ReplyBot {
  inner: Bot,
  /// Sender id, the stable external id of the user
  pub user_id: String,
  pub user_name: String,
  pub chat_id: ChatId,
}

impl ReplyBot {
  /// `None` for messages without a sender, such as channel posts.
  fn from_message(inner: Bot, msg: &Message) -> Option<Self> {
    let from = msg.from.as_ref()?;
    let user_name = from.username.clone().unwrap_or_else(|| from.full_name());

    Some(Self {
      inner,
      user_id: from.id.0.to_string(),
      user_name,
      chat_id: msg.chat.id,
    })
  }

  async fn reply_html(
    &self,
    text: impl Into<String>,
  ) -> ResponseResult<Message> {
    self
      .inner
      .send_message(self.chat_id, text.into())
      .parse_mode(ParseMode::Html)
      .await
  }
}
