//! Command-line interface definition

use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "centavo",
    about = "Assistente financeiro pessoal com ferramentas confirmadas pelo usuário",
    version
)]
pub struct Cli {
    /// Pergunta para modo de execução única
    pub question: Option<String>,

    /// Modo de conversa interativa
    #[arg(short = 'c', long)]
    pub chat: bool,

    /// Caminho explícito do arquivo de configuração
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Identificador do usuário (padrão: "local")
    #[arg(long, default_value = "local")]
    pub user: String,

    /// Aprova automaticamente toda confirmação de escrita
    #[arg(long, conflicts_with = "auto_reject")]
    pub auto_approve: bool,

    /// Rejeita automaticamente toda confirmação de escrita
    #[arg(long)]
    pub auto_reject: bool,

    /// Limite de chamadas ao modelo por execução
    #[arg(long)]
    pub max_iterations: Option<u32>,

    /// Suprime a saída de progresso
    #[arg(short, long)]
    pub quiet: bool,

    /// Verbosidade do log (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}
