use chrono::{Local, NaiveDateTime};
use log::debug;

use crate::command::{Command, LineItem, UNKNOWN_PRODUCT};
use crate::knowledge::{
    FAREWELLS, GREETINGS, HELP, KeywordAnswers, KnowledgeBase, ResponseCategory, ResponseTable,
};

/// What the speech recognizer hands over when it heard something it could not transcribe.
pub const UNINTELLIGIBLE: &str = "неразборчиво";

const TIME_KEYWORD: &str = "время";
const DATE_KEYWORD: &str = "дата";

/// Tokens dropped before the rest of an utterance is taken as a product name.
const STOP_WORDS: &[&str] = &[
    "добавить", "добавь", "положить", "положи",
    "удалить", "удали", "убери",
    "найди", "найти", "поиск",
    "товар", "товара", "продукт",
    "сколько", "стоит", "цена", "цену",
];

/// Cashier actions recognized by keyword, in matching order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CashierAction {
    AddItem,
    RemoveItem,
    FindItem,
    Total,
    Receipt,
    ClearCart,
    CompleteSale,
    PriceCheck,
}

impl CashierAction {
    pub const ORDER: [CashierAction; 8] = [
        CashierAction::AddItem,
        CashierAction::RemoveItem,
        CashierAction::FindItem,
        CashierAction::Total,
        CashierAction::Receipt,
        CashierAction::ClearCart,
        CashierAction::CompleteSale,
        CashierAction::PriceCheck,
    ];

    pub fn keywords(&self) -> &'static [&'static str] {
        match self {
            CashierAction::AddItem => &["добавить", "положить"],
            CashierAction::RemoveItem => &["удалить", "убери"],
            CashierAction::FindItem => &["найди", "поиск", "найти"],
            CashierAction::Total => &["сумма", "итого", "посчитай"],
            CashierAction::Receipt => &["чек", "распечатай"],
            CashierAction::ClearCart => &["очисти", "очистить"],
            CashierAction::CompleteSale => &["заверши", "продажа"],
            CashierAction::PriceCheck => &["сколько стоит", "цена"],
        }
    }

    /// Whether the rest of the utterance names a product.
    pub fn takes_product(&self) -> bool {
        matches!(
            self,
            CashierAction::AddItem
                | CashierAction::RemoveItem
                | CashierAction::FindItem
                | CashierAction::PriceCheck
        )
    }

    fn matches(&self, text: &str) -> bool {
        self.keywords().iter().any(|k| text.contains(k))
    }

    fn reply(&self, product: Option<&str>) -> String {
        let product = product.unwrap_or(UNKNOWN_PRODUCT);
        match self {
            CashierAction::AddItem => format!("Добавляю товар {} в корзину", product),
            CashierAction::RemoveItem => format!("Удаляю товар {} из корзины", product),
            CashierAction::FindItem => format!("Ищу товар {} в базе данных", product),
            CashierAction::Total => "Подсчитываю общую сумму заказа".to_string(),
            CashierAction::Receipt => "Формирую и печатаю кассовый чек".to_string(),
            CashierAction::ClearCart => "Очищаю корзину покупок".to_string(),
            CashierAction::CompleteSale => "Завершаю текущую продажу".to_string(),
            CashierAction::PriceCheck => format!("Проверяю цену товара {}", product),
        }
    }
}

/// Result of classifying one utterance.
#[derive(Debug, Clone, PartialEq)]
pub enum Intent {
    Greeting,
    Farewell,
    Help,
    Time,
    Date,
    Cashier {
        action: CashierAction,
        product: Option<String>,
    },
    KeywordAnswer {
        keyword: String,
        answer: String,
    },
    /// Nothing matched. A valid terminal state, answered with the unknown reply.
    Unknown,
}

impl Intent {
    /// The terminal command this intent stands for, if it has one.
    pub fn to_command(&self) -> Option<Command> {
        match self {
            Intent::Cashier {
                action: CashierAction::AddItem,
                product,
            } => Some(Command::AddItem(LineItem::with_default_quantity(
                product.as_deref(),
            ))),
            Intent::Cashier {
                action: CashierAction::ClearCart,
                ..
            } => Some(Command::ClearCart),
            Intent::Cashier {
                action: CashierAction::CompleteSale,
                ..
            } => Some(Command::CompleteSale),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Intent::Greeting => "greeting",
            Intent::Farewell => "farewell",
            Intent::Help => "help",
            Intent::Time => "time",
            Intent::Date => "date",
            Intent::Cashier { .. } => "cashier",
            Intent::KeywordAnswer { .. } => "keyword_answer",
            Intent::Unknown => "unknown",
        }
    }
}

/// Rules in priority order. The first one producing an intent wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rule {
    Greeting,
    Farewell,
    Help,
    Time,
    Date,
    Cashier,
    KeywordAnswer,
}

impl Rule {
    pub const PRIORITY: [Rule; 7] = [
        Rule::Greeting,
        Rule::Farewell,
        Rule::Help,
        Rule::Time,
        Rule::Date,
        Rule::Cashier,
        Rule::KeywordAnswer,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Rule::Greeting => "greeting",
            Rule::Farewell => "farewell",
            Rule::Help => "help",
            Rule::Time => "time",
            Rule::Date => "date",
            Rule::Cashier => "cashier",
            Rule::KeywordAnswer => "keyword_answer",
        }
    }

    fn evaluate(&self, interpreter: &Interpreter, text: &str) -> Option<Intent> {
        let kb = &interpreter.knowledge;
        match self {
            Rule::Greeting => kb.find_in(GREETINGS, text).map(|_| Intent::Greeting),
            Rule::Farewell => kb.find_in(FAREWELLS, text).map(|_| Intent::Farewell),
            Rule::Help => kb.find_in(HELP, text).map(|_| Intent::Help),
            Rule::Time => text.contains(TIME_KEYWORD).then_some(Intent::Time),
            Rule::Date => text.contains(DATE_KEYWORD).then_some(Intent::Date),
            Rule::Cashier => CashierAction::ORDER
                .iter()
                .find(|action| action.matches(text))
                .map(|action| Intent::Cashier {
                    action: *action,
                    product: if action.takes_product() {
                        product_tokens(text)
                    } else {
                        None
                    },
                }),
            Rule::KeywordAnswer => {
                interpreter
                    .answers
                    .lookup(text)
                    .map(|(keyword, answer)| Intent::KeywordAnswer {
                        keyword: keyword.to_string(),
                        answer: answer.to_string(),
                    })
            }
        }
    }
}

/// Keyword-driven interpreter over immutable phrase tables.
#[derive(Debug, Clone)]
pub struct Interpreter {
    knowledge: KnowledgeBase,
    responses: ResponseTable,
    answers: KeywordAnswers,
    sentinel: String,
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl Interpreter {
    pub fn new() -> Self {
        Self::with_tables(
            KnowledgeBase::default(),
            ResponseTable::default(),
            KeywordAnswers::default(),
        )
    }

    pub fn with_tables(
        knowledge: KnowledgeBase,
        responses: ResponseTable,
        answers: KeywordAnswers,
    ) -> Self {
        Self {
            knowledge,
            responses,
            answers,
            sentinel: UNINTELLIGIBLE.to_string(),
        }
    }

    /// Replace the unintelligible-speech sentinel.
    pub fn with_sentinel(mut self, sentinel: &str) -> Self {
        self.sentinel = sentinel.to_string();
        self
    }

    pub fn responses(&self) -> &ResponseTable {
        &self.responses
    }

    pub fn is_unintelligible(&self, text: &str) -> bool {
        let text = text.trim();
        text.is_empty() || text == self.sentinel
    }

    /// Classify a lower-cased utterance.
    pub fn classify(&self, text: &str) -> Intent {
        if self.is_unintelligible(text) {
            return Intent::Unknown;
        }
        debug!("Recognized: {}", text);

        for rule in Rule::PRIORITY {
            if let Some(intent) = rule.evaluate(self, text) {
                debug!("Rule '{}' matched", rule.name());
                return intent;
            }
        }
        Intent::Unknown
    }

    /// Answer an utterance. Never fails.
    pub fn respond(&self, text: &str) -> String {
        let intent = self.classify(text);
        self.render(&intent, Local::now().naive_local())
    }

    /// Reply text for an intent, with `now` used for the time and date answers.
    pub fn render(&self, intent: &Intent, now: NaiveDateTime) -> String {
        match intent {
            Intent::Greeting => self.responses.pick(ResponseCategory::Greeting).to_string(),
            Intent::Farewell => self.responses.pick(ResponseCategory::Farewell).to_string(),
            Intent::Help => self.responses.pick(ResponseCategory::Help).to_string(),
            Intent::Time => format!("Сейчас {}", now.format("%H:%M")),
            Intent::Date => format!("Сегодня {}", now.format("%d.%m.%Y")),
            Intent::Cashier { action, product } => action.reply(product.as_deref()),
            Intent::KeywordAnswer { answer, .. } => answer.clone(),
            Intent::Unknown => self.responses.pick(ResponseCategory::Unknown).to_string(),
        }
    }
}

/// Lower-case, trim and collapse internal whitespace.
pub fn normalize(text: &str) -> String {
    text.split_whitespace()
        .map(|word| word.to_lowercase())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Everything in `text` that is not a stop word, or the unknown-item
/// placeholder when nothing remains.
pub fn extract_product_name(text: &str) -> String {
    product_tokens(text).unwrap_or_else(|| UNKNOWN_PRODUCT.to_string())
}

fn product_tokens(text: &str) -> Option<String> {
    let words: Vec<&str> = text
        .split_whitespace()
        .filter(|word| !STOP_WORDS.contains(word))
        .collect();
    if words.is_empty() {
        None
    } else {
        Some(words.join(" "))
    }
}
