//! Interface de linha de comando baseada em clap.
//!
//! Define a struct [`Cli`] com subcomandos [`Command`] (fetch, optimize)
//! e flags globais (--config, --max-retries, --verbose).

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Sincroniza facções com a API e otimiza a escalação de tarefas.
#[derive(Debug, Parser)]
#[command(name = "faction-ops", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Arquivo de configuração (padrão: faction-ops.toml, se existir).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Total de tentativas por chamada; sobrescreve a configuração.
    #[arg(long, global = true)]
    pub max_retries: Option<u32>,

    /// Habilita logs de debug.
    #[arg(long, short, global = true, default_value_t = false)]
    pub verbose: bool,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Busca membros, tarefas abertas e histórico e grava um snapshot por facção.
    Fetch {
        /// ID da facção. Repita para várias.
        #[arg(long = "faction", required = true)]
        factions: Vec<u64>,

        /// Diretório de saída dos snapshots.
        #[arg(long, default_value = ".")]
        out: PathBuf,
    },

    /// Calcula a escalação a partir de um snapshot salvo.
    Optimize {
        /// Caminho do snapshot JSON.
        snapshot: PathBuf,

        /// Imprime o resultado como JSON.
        #[arg(long)]
        json: bool,
    },
}
