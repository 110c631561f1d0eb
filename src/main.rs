use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use chrono::{Datelike, Local};
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use registrum::error::AppError;
use registrum::models::{BackupOutcome, Column, Order, Query, SortDirection};
use registrum::{reports, settings, Session};

const LOG_ENV: &str = "REGISTRUM_LOG";

#[derive(Parser)]
#[command(name = "registrum")]
#[command(about = "Реестр счетов покупок")]
#[command(version)]
struct Cli {
  /// Store directory (base.json). Saved as the default on first run.
  #[arg(long, global = true)]
  base_dir: Option<PathBuf>,
  #[arg(long, global = true, default_value_t = false)]
  json: bool,
  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Show records; `#` is the position used by edit and delete.
  List {
    #[command(flatten)]
    filter: FilterArgs,
    #[arg(long)]
    sort: Option<Column>,
    #[arg(long, default_value_t = false, requires = "sort")]
    desc: bool,
  },
  /// Sort the stored list by a column and save that order.
  Sort {
    column: Column,
    #[arg(long, default_value_t = false)]
    desc: bool,
  },
  Add {
    #[command(flatten)]
    fields: OrderArgs,
  },
  Edit {
    position: usize,
    #[command(flatten)]
    fields: OrderArgs,
  },
  Delete {
    position: usize,
    #[arg(long, default_value_t = false)]
    yes: bool,
  },
  Import {
    path: PathBuf,
    #[arg(long, default_value_t = false)]
    yes: bool,
  },
  ExportExcel {
    path: PathBuf,
    #[command(flatten)]
    filter: FilterArgs,
  },
  ExportPdf {
    path: PathBuf,
    #[command(flatten)]
    filter: FilterArgs,
  },
  ExportCsv {
    path: PathBuf,
    #[command(flatten)]
    filter: FilterArgs,
  },
  Backup,
  Relocate {
    dir: PathBuf,
  },
  Stats {
    #[arg(long)]
    year: Option<i32>,
  },
  Payers {
    #[command(subcommand)]
    command: PayerCommand,
  },
  Audit {
    #[arg(long, default_value_t = 20)]
    limit: usize,
  },
}

#[derive(Subcommand)]
enum PayerCommand {
  List,
  Add { name: String },
  Remove { name: String },
}

#[derive(Args)]
struct FilterArgs {
  #[arg(long)]
  search: Option<String>,
  /// DD.MM.YYYY, inclusive
  #[arg(long)]
  from: Option<String>,
  /// DD.MM.YYYY, inclusive
  #[arg(long)]
  to: Option<String>,
}

impl FilterArgs {
  fn query(&self) -> Query {
    Query {
      search: self.search.clone(),
      date_from: self.from.clone(),
      date_to: self.to.clone(),
    }
  }
}

#[derive(Args)]
struct OrderArgs {
  #[arg(long)]
  date: Option<String>,
  #[arg(long = "order")]
  order_number: Option<String>,
  #[arg(long)]
  amount: Option<String>,
  #[arg(long)]
  supplier: Option<String>,
  #[arg(long)]
  payer: Option<String>,
  #[arg(long)]
  initiator: Option<String>,
  #[arg(long)]
  justification: Option<String>,
  #[arg(long)]
  paid: Option<String>,
  #[arg(long)]
  picked_up: Option<String>,
  #[arg(long)]
  comment: Option<String>,
}

impl OrderArgs {
  fn apply(self, order: &mut Order) {
    let fields = [
      (Column::Date, self.date),
      (Column::OrderNumber, self.order_number),
      (Column::Amount, self.amount),
      (Column::Supplier, self.supplier),
      (Column::Payer, self.payer),
      (Column::Initiator, self.initiator),
      (Column::Justification, self.justification),
      (Column::Paid, self.paid),
      (Column::PickedUp, self.picked_up),
      (Column::Comment, self.comment),
    ];
    for (column, value) in fields {
      if let Some(value) = value {
        order.set(column, value);
      }
    }
  }
}

fn main() -> ExitCode {
  init_tracing();
  match run(Cli::parse()) {
    Ok(()) => ExitCode::SUCCESS,
    Err(err) => {
      eprintln!("Ошибка: {}", err.message);
      ExitCode::FAILURE
    }
  }
}

fn init_tracing() {
  let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
  tracing_subscriber::registry()
    .with(filter)
    .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
    .init();
}

fn run(cli: Cli) -> Result<(), AppError> {
  let settings_path = settings::resolve_settings_path()?;
  let base_dir = resolve_base_dir(cli.base_dir, &settings_path)?;

  let mut session = Session::open(&base_dir, settings_path);
  session.auto_backup();
  for notice in session.take_notices() {
    eprintln!("Внимание: {}", notice.message);
  }

  match cli.command {
    Commands::List { filter, sort, desc } => {
      let query = filter.query();
      let rows = match sort {
        Some(column) => {
          let direction = if desc { SortDirection::Descending } else { SortDirection::Ascending };
          session.sorted_view(&query, column, direction)
        }
        None => session.view(&query).into_iter().cloned().collect(),
      };
      print_orders(&session, &rows, cli.json)
    }
    Commands::Sort { column, desc } => {
      sort_session(&mut session, column, desc);
      session.save_all()?;
      println!("Записи упорядочены по столбцу «{column}»");
      Ok(())
    }
    Commands::Add { fields } => {
      let mut order = Order::with_form_defaults(Local::now().date_naive());
      fields.apply(&mut order);
      session.save_order(order, None)?;
      println!("Новый заказ успешно добавлен!");
      Ok(())
    }
    Commands::Edit { position, fields } => {
      let id = resolve_position(&session, position)?;
      let mut order = session.find(&id).cloned().unwrap_or_default();
      fields.apply(&mut order);
      session.save_order(order, Some(&id))?;
      println!("Запись успешно обновлена!");
      Ok(())
    }
    Commands::Delete { position, yes } => {
      let id = resolve_position(&session, position)?;
      if !yes && !confirm("Вы уверены, что хотите удалить выбранную запись?")? {
        return Ok(());
      }
      session.delete_order(&id)?;
      println!("Запись удалена.");
      Ok(())
    }
    Commands::Import { path, yes } => {
      let preview = session.import_preview(&path)?;
      if preview.accepted.is_empty() {
        println!("Нет записей для импорта (пропущено строк: {}).", preview.rejected);
        return Ok(());
      }
      let prompt = format!(
        "Импортировать {} записей? Пропущено строк без суммы или поставщика: {}.",
        preview.accepted.len(),
        preview.rejected
      );
      if !yes && !confirm(&prompt)? {
        return Ok(());
      }
      let count = session.import_commit(preview)?;
      println!("Импортировано записей: {count}");
      Ok(())
    }
    Commands::ExportExcel { path, filter } => {
      let count = session.export_excel(&filter.query(), &path)?;
      println!("Файл Excel сохранён: {} ({count} записей)", path.display());
      Ok(())
    }
    Commands::ExportPdf { path, filter } => {
      let count = session.export_pdf(&filter.query(), &path)?;
      println!("Файл PDF сохранён: {} ({count} записей)", path.display());
      Ok(())
    }
    Commands::ExportCsv { path, filter } => {
      let count = session.export_csv(&filter.query(), &path)?;
      println!("Файл CSV сохранён: {} ({count} записей)", path.display());
      Ok(())
    }
    Commands::Backup => {
      match session.backup()? {
        BackupOutcome::Created(files) => {
          for file in files {
            println!("Резервная копия создана: {}", file.display());
          }
        }
        BackupOutcome::SkippedReadOnly => {
          eprintln!("Режим только для чтения. Создание резервной копии невозможно.");
        }
      }
      Ok(())
    }
    Commands::Relocate { dir } => {
      session.relocate(&dir)?;
      for notice in session.take_notices() {
        eprintln!("Внимание: {}", notice.message);
      }
      println!("Папка базы изменена на: {}", dir.display());
      Ok(())
    }
    Commands::Stats { year } => print_stats(&session, year, cli.json),
    Commands::Payers { command } => match command {
      PayerCommand::List => {
        for payer in session.payers() {
          println!("{payer}");
        }
        Ok(())
      }
      PayerCommand::Add { name } => session.add_payer(&name),
      PayerCommand::Remove { name } => {
        if !session.remove_payer(&name)? {
          eprintln!("Плательщик «{name}» не найден");
        }
        Ok(())
      }
    },
    Commands::Audit { limit } => {
      for line in session.audit_log(limit)? {
        println!("{line}");
      }
      Ok(())
    }
  }
}

/// Explicit `--base-dir`, else the stored setting. Without either there is
/// nothing to open and the program stops.
fn resolve_base_dir(explicit: Option<PathBuf>, settings_path: &Path) -> Result<PathBuf, AppError> {
  let stored = settings::load_settings(settings_path);
  match (explicit, stored) {
    (Some(dir), stored) => {
      std::fs::create_dir_all(&dir)?;
      if stored.is_none() {
        let first_run = registrum::models::Settings { base_dir: dir.clone() };
        if let Err(err) = settings::save_settings(settings_path, &first_run) {
          tracing::warn!(error = %err, "could not remember base directory");
        }
      }
      Ok(dir)
    }
    (None, Some(stored)) => Ok(stored.base_dir),
    (None, None) => Err(AppError::new(
      "NO_BASE_DIR",
      "Папка с базой не выбрана. Укажите её через --base-dir. Программа будет закрыта.",
    )),
  }
}

fn sort_session(session: &mut Session, column: Column, desc: bool) {
  let mut direction = session.sort_by(column);
  if desc && direction == SortDirection::Ascending {
    direction = session.sort_by(column);
  }
  tracing::debug!(?direction, %column, "sorted");
}

fn resolve_position(session: &Session, position: usize) -> Result<registrum::OrderId, AppError> {
  position
    .checked_sub(1)
    .and_then(|index| session.id_at(index))
    .cloned()
    .ok_or_else(|| AppError::new("NOT_FOUND", format!("Нет записи с номером {position}")))
}

fn confirm(prompt: &str) -> Result<bool, AppError> {
  print!("{prompt} [y/N] ");
  io::stdout().flush()?;
  let mut answer = String::new();
  io::stdin().lock().read_line(&mut answer)?;
  Ok(matches!(answer.trim().to_lowercase().as_str(), "y" | "yes" | "д" | "да"))
}

/// `#` is always the position in the stored list, whatever order `rows` is in,
/// so that a later `edit`/`delete` in another run hits the same record.
fn print_orders(session: &Session, rows: &[Order], json: bool) -> Result<(), AppError> {
  if json {
    println!("{}", serde_json::to_string_pretty(&rows)?);
    return Ok(());
  }

  let positions = session.positions();
  let header: Vec<&str> = Column::ALL.iter().map(|column| column.header()).collect();
  println!("#\t{}", header.join("\t"));
  for order in rows {
    let position = positions.get(&order.id).map_or(0, |index| index + 1);
    let cells: Vec<String> = order.values().iter().map(|value| value.replace('\n', " ")).collect();
    println!("{position}\t{}", cells.join("\t"));
  }
  println!("Показано записей: {} из {}", rows.len(), session.orders().len());
  Ok(())
}

fn print_stats(session: &Session, year: Option<i32>, json: bool) -> Result<(), AppError> {
  let today = Local::now().date_naive();
  let year = year.unwrap_or(today.year());
  let orders = session.orders();
  let totals = session.totals(today);
  let by_year = reports::aggregate_by_year(orders);
  let by_payer = reports::aggregate_by_year_and_payer(orders);
  let by_month = reports::aggregate_by_month(orders, year);

  if json {
    let report = serde_json::json!({
      "totals": totals,
      "by_year": by_year,
      "by_year_and_payer": by_payer,
      "by_month": { "year": year, "months": by_month },
    });
    println!("{}", serde_json::to_string_pretty(&report)?);
    return Ok(());
  }

  println!("Итого за {}: {}", totals.year, format_amount(totals.year_total));
  println!("Итого за всё время: {}", format_amount(totals.all_time_total));
  if totals.skipped > 0 {
    println!("Не учтено записей без даты или суммы: {}", totals.skipped);
  }
  println!();
  println!("По годам:");
  for row in &by_year {
    println!("  {}\t{}", row.year, format_amount(row.total));
  }
  println!("По плательщикам:");
  for row in &by_payer {
    let payer = if row.payer.is_empty() { "—" } else { row.payer.as_str() };
    println!("  {}\t{payer}\t{}", row.year, format_amount(row.total));
  }
  println!("По месяцам {year}:");
  for row in &by_month {
    println!("  {:02}\t{}", row.month, format_amount(row.total));
  }
  Ok(())
}

/// Whole roubles with a space as thousands separator, as on the chart axis.
fn format_amount(value: f64) -> String {
  let rounded = value.round() as i64;
  let digits = rounded.unsigned_abs().to_string();
  let mut grouped = String::new();
  for (index, digit) in digits.chars().enumerate() {
    if index > 0 && (digits.len() - index) % 3 == 0 {
      grouped.push(' ');
    }
    grouped.push(digit);
  }
  if rounded < 0 {
    format!("-{grouped}")
  } else {
    grouped
  }
}
