use chrono::{DateTime, Utc};
use sea_orm::Set;

pub trait BaseTimeFields {
    fn created_at(&self) -> &DateTime<Utc>;
    fn updated_at(&self) -> &DateTime<Utc>;
}

pub trait ActiveModelTimeBehavior {
    fn set_updated_at(&mut self, dt: DateTime<Utc>);

    /// Stamps a mutation. Never moves `updated_at` before `created_at`,
    /// even when the wall clock stepped backwards.
    fn touch(&mut self, model: &impl BaseTimeFields, now: DateTime<Utc>) {
        self.set_updated_at(now.max(*model.created_at()));
    }
}

impl BaseTimeFields for super::ticket::Model {
    fn created_at(&self) -> &DateTime<Utc> {
        &self.created_at
    }

    fn updated_at(&self) -> &DateTime<Utc> {
        &self.updated_at
    }
}

impl ActiveModelTimeBehavior for super::ticket::ActiveModel {
    fn set_updated_at(&mut self, dt: DateTime<Utc>) {
        self.updated_at = Set(dt);
    }
}

impl BaseTimeFields for super::user::Model {
    fn created_at(&self) -> &DateTime<Utc> {
        &self.created_at
    }

    fn updated_at(&self) -> &DateTime<Utc> {
        &self.updated_at
    }
}

impl ActiveModelTimeBehavior for super::user::ActiveModel {
    fn set_updated_at(&mut self, dt: DateTime<Utc>) {
        self.updated_at = Set(dt);
    }
}
