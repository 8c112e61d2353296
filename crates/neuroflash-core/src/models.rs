//! Domain models for NeuroFlash

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Ease factor at or above which a review card counts as mastered
pub const MASTERED_EASE: f64 = 2.8;

/// Learning state of a flashcard
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CardType {
    /// Never reviewed
    New,
    /// Recently introduced or lapsed
    Learning,
    /// Graduated, intervals grow with the ease factor
    Review,
}

impl CardType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Learning => "learning",
            Self::Review => "review",
        }
    }
}

impl std::str::FromStr for CardType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "new" => Ok(Self::New),
            "learning" => Ok(Self::Learning),
            "review" => Ok(Self::Review),
            _ => Err(format!("Unknown card type: {}", s)),
        }
    }
}

impl std::fmt::Display for CardType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// How well the user recalled a card
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Rating {
    Hard,
    Good,
    Easy,
}

impl Rating {
    /// Ordinal stored in the review log (1 = hard, 2 = good, 3 = easy)
    pub fn ordinal(&self) -> i64 {
        match self {
            Self::Hard => 1,
            Self::Good => 2,
            Self::Easy => 3,
        }
    }

    pub fn from_ordinal(n: i64) -> Option<Self> {
        match n {
            1 => Some(Self::Hard),
            2 => Some(Self::Good),
            3 => Some(Self::Easy),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hard => "hard",
            Self::Good => "good",
            Self::Easy => "easy",
        }
    }

    /// Display label used in activity feeds
    pub fn label(&self) -> &'static str {
        match self {
            Self::Hard => "Hard",
            Self::Good => "Good",
            Self::Easy => "Easy",
        }
    }

    /// Points awarded for a review with this rating
    pub fn points(&self) -> i64 {
        match self {
            Self::Hard => 50,
            Self::Good => 200,
            Self::Easy => 500,
        }
    }

    /// Parse user input, accepting names (any case) or ordinals
    pub fn parse(input: &str) -> Result<Self> {
        input.parse().map_err(Error::Validation)
    }
}

impl std::str::FromStr for Rating {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "hard" | "1" => Ok(Self::Hard),
            "good" | "2" => Ok(Self::Good),
            "easy" | "3" => Ok(Self::Easy),
            _ => Err(format!(
                "Invalid rating '{}'. Expected \"hard\", \"good\", or \"easy\".",
                s
            )),
        }
    }
}

impl std::fmt::Display for Rating {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Memory state of a card, the part the scheduler reads and writes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CardState {
    pub card_type: CardType,
    pub due_date: NaiveDate,
    pub ease_factor: f64,
    /// Current interval in days (0 until the first review)
    #[serde(rename = "intervals")]
    pub interval_days: i64,
    pub reps: i64,
    pub lapses: i64,
    pub last_reviewed: Option<DateTime<Utc>>,
}

impl CardState {
    /// State of a freshly created card
    pub fn new_card(today: NaiveDate) -> Self {
        Self {
            card_type: CardType::New,
            due_date: today,
            ease_factor: crate::scheduler::DEFAULT_EASE,
            interval_days: 0,
            reps: 0,
            lapses: 0,
            last_reviewed: None,
        }
    }

    pub fn is_mastered(&self) -> bool {
        self.card_type == CardType::Review && self.ease_factor >= MASTERED_EASE
    }
}

/// A flashcard with its note content
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Card {
    #[serde(rename = "flashcard_id")]
    pub id: i64,
    pub note_id: i64,
    pub deck_id: i64,
    pub front: String,
    pub back: String,
    #[serde(flatten)]
    pub state: CardState,
    pub created_at: DateTime<Utc>,
}

/// Front/back content of a note, stored as JSON
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoteFields {
    #[serde(rename = "Front")]
    pub front: String,
    #[serde(rename = "Back")]
    pub back: String,
}

impl NoteFields {
    pub fn new(front: &str, back: &str) -> Result<Self> {
        let front = front.trim();
        let back = back.trim();
        if front.is_empty() || back.is_empty() {
            return Err(Error::Validation(
                "Front and Back text are required".to_string(),
            ));
        }
        Ok(Self {
            front: front.to_string(),
            back: back.to_string(),
        })
    }

    /// Decode stored field values
    ///
    /// Tolerates double-encoded JSON strings. Anything unreadable decodes to
    /// a placeholder instead of failing the whole listing.
    pub fn decode(raw: &str) -> Self {
        if let Ok(fields) = serde_json::from_str::<NoteFields>(raw) {
            return fields;
        }
        if let Ok(inner) = serde_json::from_str::<String>(raw) {
            if let Ok(fields) = serde_json::from_str::<NoteFields>(&inner) {
                return fields;
            }
        }
        Self {
            front: "Error: Malformed content data".to_string(),
            back: String::new(),
        }
    }

    pub fn encode(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// A note (owner of card content)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Note {
    pub id: i64,
    pub user_id: i64,
    pub front: String,
    pub back: String,
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
}

/// Immutable record of a single review
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewLogEntry {
    pub id: i64,
    pub flashcard_id: i64,
    pub user_id: i64,
    pub rating: Rating,
    pub review_time: DateTime<Utc>,
    pub interval_before: i64,
    pub interval_after: i64,
    pub ease_factor_before: f64,
    pub ease_factor_after: f64,
}

/// Review log entry before it has been persisted
#[derive(Debug, Clone, PartialEq)]
pub struct NewReviewLog {
    pub flashcard_id: i64,
    pub user_id: i64,
    pub rating: Rating,
    pub review_time: DateTime<Utc>,
    pub interval_before: i64,
    pub interval_after: i64,
    pub ease_factor_before: f64,
    pub ease_factor_after: f64,
}

/// Cumulative per-user statistics
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserStats {
    pub user_id: i64,
    pub points: i64,
    pub total_reviews: i64,
    pub last_reviewed_date: Option<NaiveDate>,
    pub review_streak_days: i64,
}

/// Per-user study configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudySettings {
    pub new_cards_per_day: i64,
    pub max_reviews_per_day: i64,
    /// Comma-separated learning steps in minutes (e.g. "1,10")
    pub learning_steps: String,
    pub ease_bonus: f64,
}

impl Default for StudySettings {
    fn default() -> Self {
        Self {
            new_cards_per_day: 20,
            max_reviews_per_day: 100,
            learning_steps: "1,10".to_string(),
            ease_bonus: crate::scheduler::DEFAULT_EASE_BONUS,
        }
    }
}

impl StudySettings {
    pub fn validate(&self) -> Result<()> {
        if self.new_cards_per_day < 0 || self.max_reviews_per_day < 0 {
            return Err(Error::Validation("Values cannot be negative".to_string()));
        }
        if !(self.ease_bonus > 0.0) || !self.ease_bonus.is_finite() {
            return Err(Error::Validation("Ease bonus must be positive".to_string()));
        }
        self.learning_step_minutes()?;
        Ok(())
    }

    /// Parsed learning steps
    pub fn learning_step_minutes(&self) -> Result<Vec<u32>> {
        self.learning_steps
            .split(',')
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .map(|s| match s.parse::<u32>() {
                Ok(n) if n > 0 => Ok(n),
                _ => Err(Error::Validation(format!("Invalid learning step: {}", s))),
            })
            .collect()
    }

    /// Apply a partial update on top of these settings
    pub fn merged(&self, update: &SettingsUpdate) -> Self {
        Self {
            new_cards_per_day: update.new_cards_per_day.unwrap_or(self.new_cards_per_day),
            max_reviews_per_day: update
                .max_reviews_per_day
                .unwrap_or(self.max_reviews_per_day),
            learning_steps: update
                .learning_steps
                .clone()
                .unwrap_or_else(|| self.learning_steps.clone()),
            ease_bonus: update.ease_bonus.unwrap_or(self.ease_bonus),
        }
    }
}

/// Partial settings update (absent fields keep their current value)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SettingsUpdate {
    pub new_cards_per_day: Option<i64>,
    pub max_reviews_per_day: Option<i64>,
    pub learning_steps: Option<String>,
    pub ease_bonus: Option<f64>,
}

/// A registered user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub date_of_birth: Option<NaiveDate>,
    pub gender: Option<String>,
    pub country: Option<String>,
    pub city: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Data required to register a user
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password: String,
    pub date_of_birth: Option<NaiveDate>,
    pub gender: Option<String>,
    pub country: Option<String>,
    pub city: Option<String>,
}

/// User profile with settings and points
#[derive(Debug, Clone, Serialize)]
pub struct Profile {
    #[serde(flatten)]
    pub user: User,
    pub settings: StudySettings,
    pub points: i64,
}

/// Partial profile update
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfileUpdate {
    pub username: Option<String>,
    pub email: Option<String>,
    #[serde(default)]
    pub settings: SettingsUpdate,
}

/// A tag
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub id: i64,
    pub name: String,
}

/// A deck with progress figures
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Deck {
    pub id: i64,
    pub user_id: i64,
    pub name: String,
    pub description: Option<String>,
    pub tags: Vec<String>,
    pub card_count: i64,
    pub mastered_count: i64,
    pub mastered_percentage: i64,
    pub created_at: DateTime<Utc>,
}

/// Card content supplied when creating a deck
#[derive(Debug, Clone, Deserialize)]
pub struct NewCardContent {
    pub front: String,
    pub back: String,
}

/// Data required to create a deck
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewDeck {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub cards: Vec<NewCardContent>,
}

/// Result row of a card search
#[derive(Debug, Clone, Serialize)]
pub struct CardSearchResult {
    pub note_id: i64,
    pub flashcard_id: i64,
    pub front: String,
    pub back: String,
    pub deck_id: i64,
    pub deck_name: String,
    pub card_type: CardType,
    pub due_date: NaiveDate,
    pub tags: Vec<String>,
}

/// Card search filters
#[derive(Debug, Clone, Default)]
pub struct CardSearch {
    pub query: Option<String>,
    pub tag_ids: Vec<i64>,
    pub deck_ids: Vec<i64>,
}

/// One day of the performance window
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyReviewStat {
    pub date: NaiveDate,
    pub review_count: i64,
    /// Average rating, None on days without reviews
    pub average_rating: Option<f64>,
}

/// Dashboard summary for a user
#[derive(Debug, Clone, Default, Serialize)]
pub struct DashboardStats {
    pub total_decks: i64,
    pub cards_mastered: i64,
    pub points: i64,
    pub review_streak_days: i64,
}

/// Recent review activity item
#[derive(Debug, Clone, Serialize)]
pub struct ActivityItem {
    pub review_id: i64,
    pub flashcard_id: i64,
    pub deck_name: String,
    pub rating: Rating,
    pub description: String,
    pub review_time: DateTime<Utc>,
}

/// A ranked leaderboard row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub user_id: i64,
    pub username: String,
    pub points: i64,
    pub rank: i64,
}

/// A row of the denormalized leaderboard snapshot
#[derive(Debug, Clone, Serialize)]
pub struct LeaderboardSnapshotEntry {
    #[serde(flatten)]
    pub entry: LeaderboardEntry,
    pub captured_at: DateTime<Utc>,
}

/// Pagination metadata
#[derive(Debug, Clone, Serialize)]
pub struct Pagination {
    pub page: i64,
    pub limit: i64,
    pub total_entries: i64,
    pub total_pages: i64,
}

/// A page of the live leaderboard
#[derive(Debug, Clone, Serialize)]
pub struct LeaderboardPage {
    pub leaderboard: Vec<LeaderboardEntry>,
    pub current_user_rank: Option<LeaderboardEntry>,
    pub pagination: Pagination,
}

/// Result of a leaderboard snapshot refresh
#[derive(Debug, Clone, Serialize)]
pub struct SnapshotRefreshResult {
    pub entries: usize,
    pub captured_at: DateTime<Utc>,
}
