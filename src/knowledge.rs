//! Static phrase tables the rule-based interpreter matches against and
//! answers from. Nothing here changes after construction, so the tables can
//! be shared freely between tasks.

use std::collections::HashMap;

use rand::seq::SliceRandom;

pub const GREETINGS: &str = "greetings";
pub const FAREWELLS: &str = "farewells";
pub const HELP: &str = "help";

const FALLBACK_REPLY: &str = "Извините, я не понял команду.";

/// Category name to ordered trigger phrases.
#[derive(Debug, Clone)]
pub struct KnowledgeBase {
    categories: Vec<(String, Vec<String>)>,
}

impl KnowledgeBase {
    pub fn empty() -> Self {
        Self {
            categories: Vec::new(),
        }
    }

    /// Add (or replace) a category.
    pub fn with_category(mut self, name: &str, phrases: &[&str]) -> Self {
        let phrases: Vec<String> = phrases.iter().map(|p| p.to_string()).collect();
        match self.categories.iter_mut().find(|(n, _)| n == name) {
            Some((_, existing)) => *existing = phrases,
            None => self.categories.push((name.to_string(), phrases)),
        }
        self
    }

    pub fn phrases(&self, category: &str) -> &[String] {
        self.categories
            .iter()
            .find(|(name, _)| name == category)
            .map(|(_, phrases)| phrases.as_slice())
            .unwrap_or(&[])
    }

    /// First phrase of `category` contained in `text`, if any.
    pub fn find_in(&self, category: &str, text: &str) -> Option<&str> {
        self.phrases(category)
            .iter()
            .find(|phrase| text.contains(phrase.as_str()))
            .map(String::as_str)
    }

    pub fn categories(&self) -> impl Iterator<Item = &str> {
        self.categories.iter().map(|(name, _)| name.as_str())
    }
}

impl Default for KnowledgeBase {
    fn default() -> Self {
        KnowledgeBase::empty()
            .with_category(
                GREETINGS,
                &["привет", "здравствуй", "добрый день", "доброе утро", "добрый вечер"],
            )
            .with_category(FAREWELLS, &["пока", "до свидания", "выход", "закрыть"])
            .with_category(HELP, &["помощь", "справка", "что ты умеешь"])
    }
}

/// Reply categories with canned answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResponseCategory {
    Greeting,
    Farewell,
    Help,
    Unknown,
    Acknowledge,
}

/// Candidate replies per category; one is picked at random per call.
#[derive(Debug, Clone)]
pub struct ResponseTable {
    replies: HashMap<ResponseCategory, Vec<String>>,
}

impl ResponseTable {
    pub fn empty() -> Self {
        Self {
            replies: HashMap::new(),
        }
    }

    pub fn with_replies(mut self, category: ResponseCategory, replies: &[&str]) -> Self {
        self.replies
            .insert(category, replies.iter().map(|r| r.to_string()).collect());
        self
    }

    /// Candidates for `category`, falling back to the unknown set when the
    /// category has none.
    pub fn candidates(&self, category: ResponseCategory) -> &[String] {
        match self.replies.get(&category) {
            Some(replies) if !replies.is_empty() => replies.as_slice(),
            _ => self
                .replies
                .get(&ResponseCategory::Unknown)
                .map(Vec::as_slice)
                .unwrap_or(&[]),
        }
    }

    pub fn pick(&self, category: ResponseCategory) -> &str {
        self.candidates(category)
            .choose(&mut rand::thread_rng())
            .map(String::as_str)
            .unwrap_or(FALLBACK_REPLY)
    }
}

impl Default for ResponseTable {
    fn default() -> Self {
        ResponseTable::empty()
            .with_replies(
                ResponseCategory::Greeting,
                &[
                    "Приветствую! Я ваш голосовой помощник для кассовой системы.",
                    "Здравствуйте! Чем могу помочь?",
                    "Добрый день! Готов к работе.",
                ],
            )
            .with_replies(
                ResponseCategory::Farewell,
                &[
                    "До свидания! Хорошего дня!",
                    "Всего доброго! Обращайтесь еще.",
                    "Пока! Буду ждать ваших команд.",
                ],
            )
            .with_replies(
                ResponseCategory::Unknown,
                &[
                    "Извините, я не понял команду. Повторите, пожалуйста.",
                    "Не совсем понимаю, что вы имеете в виду.",
                    "Можете переформулировать запрос?",
                ],
            )
            .with_replies(
                ResponseCategory::Help,
                &[
                    "Я умею: добавлять товары в корзину, считать сумму, печатать чеки, искать товары.",
                    "Мои команды: сказать 'добавить iPhone' или 'сколько стоит Samsung'.",
                    "Попросите: 'найди товар', 'очисти корзину', 'распечатай чек'.",
                ],
            )
            .with_replies(
                ResponseCategory::Acknowledge,
                &["Да, сэр.", "Слушаю, сэр.", "К вашим услугам."],
            )
    }
}

/// Ordered domain keyword to canned answer. The first key found in the
/// utterance wins.
#[derive(Debug, Clone)]
pub struct KeywordAnswers {
    entries: Vec<(String, String)>,
}

impl KeywordAnswers {
    pub fn empty() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    pub fn with_answer(mut self, keyword: &str, answer: &str) -> Self {
        self.entries.push((keyword.to_string(), answer.to_string()));
        self
    }

    pub fn lookup(&self, text: &str) -> Option<(&str, &str)> {
        self.entries
            .iter()
            .find(|(keyword, _)| text.contains(keyword.as_str()))
            .map(|(keyword, answer)| (keyword.as_str(), answer.as_str()))
    }
}

impl Default for KeywordAnswers {
    fn default() -> Self {
        KeywordAnswers::empty()
            .with_answer(
                "гарантия",
                "Гарантия на все товары составляет 12 месяцев с момента покупки. Сохраняйте кассовый чек.",
            )
            .with_answer(
                "доставка",
                "Доставка по городу занимает от одного до трех рабочих дней.",
            )
            .with_answer(
                "возврат",
                "Возврат товара надлежащего качества возможен в течение 14 дней при наличии чека.",
            )
            .with_answer(
                "оплата",
                "Принимаем оплату наличными, банковскими картами и по QR-коду.",
            )
            .with_answer(
                "скидка",
                "Скидки действуют для владельцев карты постоянного покупателя.",
            )
    }
}
