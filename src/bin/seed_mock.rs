use std::path::PathBuf;

use chrono::{Duration, Local};
use rand::seq::SliceRandom;
use rand::Rng;

use registrum::error::AppError;
use registrum::models::{ImportPreview, Order};
use registrum::{settings, Session};

const SUPPLIERS: [&str; 6] = [
  "ООО «ТехноСнаб»",
  "ИП Петров",
  "АО «Офисмаг»",
  "ООО «Ситилинк»",
  "ООО «КанцЛайн»",
  "ООО «СетьСервис»",
];
const JUSTIFICATIONS: [&str; 6] = [
  "Замена картриджей",
  "Расходные материалы для печати",
  "Ремонт ноутбука",
  "Кабели и коммутатор для серверной",
  "Канцелярия на квартал",
  "Лицензии ПО",
];
const INITIATORS: [&str; 3] = ["ИТ", "Бухгалтерия", "Склад"];

fn main() -> Result<(), Box<dyn std::error::Error>> {
  let count = std::env::args()
    .nth(1)
    .and_then(|value| value.parse::<usize>().ok())
    .unwrap_or(500);

  let settings_path = settings::resolve_settings_path()?;
  let base_dir = if let Ok(path) = std::env::var("REGISTRUM_SEED_DIR") {
    PathBuf::from(path)
  } else {
    settings::load_settings(&settings_path)
      .map(|stored| stored.base_dir)
      .ok_or_else(|| AppError::new("NO_BASE_DIR", "REGISTRUM_SEED_DIR не задан и папка базы не выбрана"))?
  };
  std::fs::create_dir_all(&base_dir)?;

  let mut session = Session::open(&base_dir, settings_path);
  let payers = session.payers().to_vec();
  let preview = ImportPreview {
    source: PathBuf::from("seed_mock"),
    accepted: mock_orders(count, &payers),
    rejected: 0,
  };
  let created = session.import_commit(preview)?;

  println!("Добавлено {} демо-заказов в {}", created, base_dir.display());
  Ok(())
}

fn mock_orders(count: usize, payers: &[String]) -> Vec<Order> {
  let mut rng = rand::thread_rng();
  let today = Local::now().date_naive();

  (0..count)
    .map(|index| {
      let date = today - Duration::days(rng.gen_range(0..730));
      let kopecks: u32 = rng.gen_range(50_000..25_000_000);
      Order {
        date: date.format("%d.%m.%Y").to_string(),
        order_number: format!("DEMO-{:05}", index + 1),
        amount: format!("{},{:02}", kopecks / 100, kopecks % 100),
        supplier: pick(&mut rng, &SUPPLIERS),
        payer: payers.choose(&mut rng).cloned().unwrap_or_default(),
        initiator: pick(&mut rng, &INITIATORS),
        justification: pick(&mut rng, &JUSTIFICATIONS),
        paid: yes_no(&mut rng, 80),
        picked_up: yes_no(&mut rng, 60),
        comment: String::new(),
        ..Order::default()
      }
    })
    .collect()
}

fn yes_no(rng: &mut impl Rng, yes_percent: u32) -> String {
  let answer = if rng.gen_range(0..100) < yes_percent { "Да" } else { "Нет" };
  answer.to_string()
}

fn pick(rng: &mut impl Rng, items: &[&str]) -> String {
  items.choose(rng).map(|item| item.to_string()).unwrap_or_default()
}
