use log::debug;

use crate::client::cli::Client;
use crate::config::ClientConfig;
use crate::error::MiniRedisConnectionError;

/// 连接建立后的初始化步骤，严格按顺序执行。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum HandshakeState {
    Auth,
    Select,
    SetName,
    Done,
}

/// 依次执行 AUTH、SELECT、CLIENT SETNAME。
///
/// 对应的配置缺失（没有密码、数据库为 0、没有名字）时直接进入下一步，不产生网络往返。
/// 任何一步失败都会关闭连接并返回失败原因，这样的连接不会交给调用者。
pub(crate) async fn run(client: &Client, config: &ClientConfig) -> Result<(), MiniRedisConnectionError> {
    let mut state = HandshakeState::Auth;

    while state != HandshakeState::Done {
        match step(client, config, state).await {
            Ok(next) => state = next,
            Err(e) => {
                debug!("client #{} handshake failed at {:?}: {}", client.id(), state, e);
                client.close();
                return Err(e);
            }
        }
    }

    debug!("client #{} handshake done", client.id());
    Ok(())
}

async fn step(
    client: &Client,
    config: &ClientConfig,
    state: HandshakeState,
) -> Result<HandshakeState, MiniRedisConnectionError> {
    match state {
        HandshakeState::Auth => {
            if let Some(password) = &config.password {
                client.auth(password).await?;
            }
            Ok(HandshakeState::Select)
        }
        HandshakeState::Select => {
            if config.database != 0 {
                client.select(config.database).await?;
            }
            Ok(HandshakeState::SetName)
        }
        HandshakeState::SetName => {
            if let Some(name) = &config.client_name {
                client.client_setname(name).await?;
            }
            Ok(HandshakeState::Done)
        }
        HandshakeState::Done => Ok(HandshakeState::Done),
    }
}
