use nostr::{Filter, Kind, PublicKey};

/// One resolved subscription request (id + filter) ready to hand to a
/// `RelayClient::subscribe`.
#[derive(Debug, Clone)]
pub struct SubscriptionPlan {
    pub id: String,
    pub filter: Filter,
    /// `max(last_eose, last_disco)` for the relay this plan targets, or
    /// `now - 72h` if the relay has never reported either. Intentionally
    /// not folded into `filter` — see DESIGN.md's Open Question note.
    pub resume_horizon: u64,
}

const HOP1_SEALED_DM_LIMIT: usize = 2000;
const HOP2_AUTHOR_CHUNK: usize = 1000;
const RESUME_DEFAULT_LOOKBACK_SECS: u64 = 72 * 3600;

/// Builds the hop-1 and hop-2 filter bundles for account `p`, given the
/// hop-1 author set (follows ∪ DM counterparties, already deduplicated).
///
/// The hop-2 author list is split with `chunks(1000)`: every pubkey in `h1`
/// lands in exactly one contiguous chunk and the chunks' union is `h1`,
/// resolving the tail/off-by-one ambiguity by construction rather than by a
/// manually tracked index.
pub fn plan_subscriptions(
    p: PublicKey,
    h1: &[PublicKey],
    last_eose: u64,
    last_disco: u64,
    now: u64,
) -> Vec<SubscriptionPlan> {
    let resume_horizon = match last_eose.max(last_disco) {
        0 => now.saturating_sub(RESUME_DEFAULT_LOOKBACK_SECS),
        horizon => horizon,
    };

    let mut plans = Vec::new();

    plans.push(SubscriptionPlan {
        id: "hop1-metadata".to_string(),
        filter: Filter::new().kind(Kind::Metadata).author(p).limit(1),
        resume_horizon,
    });
    plans.push(SubscriptionPlan {
        id: "hop1-contacts".to_string(),
        filter: Filter::new().kind(Kind::ContactList).author(p).limit(1),
        resume_horizon,
    });
    plans.push(SubscriptionPlan {
        id: "hop1-dm-relay-list".to_string(),
        filter: Filter::new()
            .kind(Kind::Custom(10050))
            .author(p)
            .limit(1),
        resume_horizon,
    });
    plans.push(SubscriptionPlan {
        id: "hop1-sealed-dm".to_string(),
        filter: Filter::new()
            .kind(Kind::GiftWrap)
            .pubkey(p)
            .limit(HOP1_SEALED_DM_LIMIT),
        resume_horizon,
    });

    for (idx, chunk) in h1.chunks(HOP2_AUTHOR_CHUNK).enumerate() {
        plans.push(SubscriptionPlan {
            id: format!("hop2-{idx}"),
            filter: Filter::new()
                .kinds([Kind::Metadata, Kind::Custom(10050)])
                .authors(chunk.iter().copied())
                .limit(HOP2_AUTHOR_CHUNK),
            resume_horizon,
        });
    }

    plans
}
