use super::Marketplace;
use super::adapter::{Clock, StorageAdapter};
use super::keys;
use crate::error::{MarketError, MarketResult};
use rust_decimal::{Decimal, RoundingStrategy};
use tripfin_shared::protocol::{CreateRatingRequest, LenderRatings};
use tripfin_shared::{Rating, Trip, TripStatus, User};

const MAX_REVIEW_CHARS: usize = 1000;

impl<S, C> Marketplace<S, C>
where
    S: StorageAdapter,
    C: Clock,
{
    async fn all_ratings(&self) -> MarketResult<Vec<Rating>> {
        let mut list: Vec<Rating> = self
            .storage
            .list(keys::RATING)
            .await?
            .into_iter()
            .map(|(_, r)| r)
            .collect();
        list.sort_by(|a: &Rating, b: &Rating| b.created_at.cmp(&a.created_at));
        Ok(list)
    }

    /// 借款人在还款后给出借人打分，每个行程一次
    pub async fn rate(&self, actor: &User, req: CreateRatingRequest) -> MarketResult<Rating> {
        if !(1..=5).contains(&req.rating) {
            return Err(MarketError::invalid_input("Rating must be between 1 and 5"));
        }
        let review_text = req
            .review_text
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty());
        if review_text.as_ref().is_some_and(|t| t.chars().count() > MAX_REVIEW_CHARS) {
            return Err(MarketError::invalid_input(format!(
                "Review must be at most {} characters",
                MAX_REVIEW_CHARS
            )));
        }

        let mut trip = self.load_trip(&req.trip_id).await?;
        if trip.load_owner_id != actor.id {
            return Err(MarketError::forbidden("Only the borrower can rate this loan"));
        }
        if trip.status != TripStatus::Repaid {
            return Err(MarketError::conflict("Only repaid loans can be rated"));
        }
        if trip.has_rating {
            return Err(MarketError::conflict("This trip has already been rated"));
        }
        let (Some(lender_id), Some(lender_name)) = (trip.lender_id.clone(), trip.lender_name.clone()) else {
            return Err(MarketError::store("Repaid trip has no lender").in_op_with("ratings.rate", &trip.id));
        };

        let rating = Rating {
            id: Self::new_id(),
            trip_id: trip.id.clone(),
            lender_id,
            lender_name,
            borrower_id: actor.id.clone(),
            borrower_name: actor.name.clone(),
            rating: req.rating,
            review_text,
            loan_amount: trip.amount,
            interest_rate: trip.interest_rate,
            created_at: self.now(),
        };
        self.storage.put(&keys::rating(&rating.id), &rating).await?;
        trip.has_rating = true;
        self.save_trip(&trip).await?;
        Ok(rating)
    }

    pub async fn lender_ratings(&self, lender_id: &str) -> MarketResult<LenderRatings> {
        let ratings: Vec<Rating> = self
            .all_ratings()
            .await?
            .into_iter()
            .filter(|r| r.lender_id == lender_id)
            .collect();

        let mut by_star = [0usize; 5];
        let mut sum = 0u32;
        for r in &ratings {
            by_star[usize::from(r.rating.clamp(1, 5)) - 1] += 1;
            sum += u32::from(r.rating);
        }
        let average = if ratings.is_empty() {
            Decimal::ZERO
        } else {
            (Decimal::from(sum) / Decimal::from(ratings.len()))
                .round_dp_with_strategy(1, RoundingStrategy::MidpointAwayFromZero)
        };

        Ok(LenderRatings {
            count: ratings.len(),
            ratings,
            average,
            by_star,
        })
    }

    /// 已还款但尚未评分的行程
    pub async fn pending_ratings(&self, actor: &User, user_id: &str) -> MarketResult<Vec<Trip>> {
        if actor.id != user_id && !actor.role.is_admin() {
            return Err(MarketError::forbidden("Cannot view another user's pending ratings"));
        }
        Ok(self
            .all_trips()
            .await?
            .into_iter()
            .filter(|t| t.load_owner_id == user_id && t.status == TripStatus::Repaid && !t.has_rating)
            .collect())
    }
}
