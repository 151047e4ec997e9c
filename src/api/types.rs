//! Tipos de payload da API da facção.
//!
//! Cada endpoint é decodificado uma única vez, na fronteira, em structs
//! tipadas. Timestamps chegam como segundos Unix.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Resposta de `GET /faction/{id}/members`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MembersResponse {
    pub members: Vec<MemberRecord>,
}

/// Um membro da facção.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemberRecord {
    pub id: u64,
    pub name: String,
    /// Última ação registrada no jogo; ausente para membros sem histórico.
    #[serde(default, with = "chrono::serde::ts_seconds_option")]
    pub last_action: Option<DateTime<Utc>>,
}

/// Resposta de `GET /faction/{id}/tasks?status=open`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenTasksResponse {
    pub tasks: Vec<TaskRecord>,
}

/// Uma tarefa aberta com suas posições.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRecord {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub difficulty: Option<u32>,
    #[serde(default, with = "chrono::serde::ts_seconds_option")]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub reward: Reward,
    pub slots: Vec<SlotRecord>,
}

/// Uma posição dentro de uma tarefa. `user_id` preenchido significa ocupada.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlotRecord {
    pub position: String,
    pub position_id: u64,
    #[serde(default)]
    pub user_id: Option<u64>,
}

/// Recompensa de uma tarefa, identificada pelo campo `type`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Reward {
    Money {
        amount: u64,
    },
    Items {
        items: Vec<ItemReward>,
    },
    /// Dinheiro e itens juntos.
    Mixed {
        amount: u64,
        items: Vec<ItemReward>,
    },
    #[default]
    None,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemReward {
    pub id: u64,
    #[serde(default = "default_quantity")]
    pub quantity: u32,
    /// Valor de mercado unitário.
    #[serde(default)]
    pub value: u64,
}

// Quantidade padrão de um item de recompensa: 1.
fn default_quantity() -> u32 {
    1
}

impl Reward {
    /// Valor esperado total: dinheiro mais o valor de mercado dos itens.
    pub fn expected_value(&self) -> u64 {
        fn items_value(items: &[ItemReward]) -> u64 {
            items.iter().fold(0u64, |acc, item| {
                acc.saturating_add(item.value.saturating_mul(u64::from(item.quantity)))
            })
        }

        match self {
            Reward::Money { amount } => *amount,
            Reward::Items { items } => items_value(items),
            Reward::Mixed { amount, items } => amount.saturating_add(items_value(items)),
            Reward::None => 0,
        }
    }
}

/// Resposta de `GET /faction/{id}/history`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryResponse {
    pub records: Vec<ParticipationRecord>,
}

/// Participação de um jogador em uma tarefa concluída.
///
/// `faction_id` identifica o grupo em que a participação ocorreu; pode
/// diferir da facção consultada quando o jogador veio de outra facção.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParticipationRecord {
    pub user_id: u64,
    pub faction_id: u64,
    pub task_name: String,
    pub position: String,
    pub success: bool,
}
