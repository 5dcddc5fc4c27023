use super::*;

fn edtech_profile() -> StartupProfile {
    StartupProfile {
        startup_name: "StoryLingo".to_string(),
        industry: "EdTech".to_string(),
        business_model: "freemium subscriptions".to_string(),
        solution: "story based learning".to_string(),
        target_customer: "young professionals".to_string(),
        ..StartupProfile::default()
    }
}

#[test]
fn normalize_key_strips_spaces_and_hyphens() {
    assert_eq!(normalize_key("Bee Lingu-App"), "beelinguapp");
    assert_eq!(normalize_key("  "), "");
}

#[test]
fn builtin_has_four_companies_in_order() {
    let kb = KnowledgeBase::builtin();
    assert_eq!(kb.len(), 4);
    assert!(!kb.is_empty());

    let names: Vec<&str> = kb.records().map(|record| record.name.as_str()).collect();
    assert_eq!(names, vec!["Beelinguapp", "Airbnb", "Uber", "Dropbox"]);
}

#[test]
fn exists_finds_known_company() {
    let check = KnowledgeBase::builtin().exists("Beelinguapp");

    assert!(check.exists);
    assert_eq!(check.matched_key.as_deref(), Some("beelinguapp"));
    assert_eq!(check.record.map(|record| record.name), Some("Beelinguapp".to_string()));
}

#[test]
fn exists_rejects_unknown_company() {
    let check = KnowledgeBase::builtin().exists("NovaCloud");
    assert_eq!(check, ExistenceCheck::not_found());
}

#[test]
fn exists_normalizes_spacing_and_case() {
    assert!(KnowledgeBase::builtin().exists("Bee-Lingu App").exists);
    assert!(KnowledgeBase::builtin().exists("AIRBNB").exists);
}

#[test]
fn exists_matches_in_both_directions() {
    let kb = KnowledgeBase::builtin();

    let shorter = kb.exists("Drop");
    assert_eq!(shorter.matched_key.as_deref(), Some("dropbox"));

    let longer = kb.exists("Dropbox Inc");
    assert_eq!(longer.matched_key.as_deref(), Some("dropbox"));
}

#[test]
fn exists_has_known_false_positive_on_short_keys() {
    // "uberxlogistics" contains the key "uber" even though it is a different company
    let check = KnowledgeBase::builtin().exists("uberx-logistics");

    assert!(check.exists);
    assert_eq!(check.matched_key.as_deref(), Some("uber"));
}

#[test]
fn exists_with_blank_name_is_not_found() {
    assert!(!KnowledgeBase::builtin().exists(" - ").exists);
}

#[test]
fn exists_returns_first_match_in_store_order() {
    let cloud = CompanyRecord {
        name: "Cloud".to_string(),
        ..CompanyRecord::default()
    };
    let kitchen = CompanyRecord {
        name: "CloudKitchen".to_string(),
        ..CompanyRecord::default()
    };

    let kb = KnowledgeBase::new([cloud.clone(), kitchen.clone()]);
    assert_eq!(kb.exists("cloudkitchen").matched_key.as_deref(), Some("cloud"));

    let kb = KnowledgeBase::new([kitchen, cloud]);
    assert_eq!(kb.exists("cloud").matched_key.as_deref(), Some("cloudkitchen"));
}

#[test]
fn duplicate_keys_replace_in_place() {
    let kb = KnowledgeBase::new([
        CompanyRecord {
            name: "Uber".to_string(),
            industry: "Old".to_string(),
            ..CompanyRecord::default()
        },
        CompanyRecord {
            name: "Airbnb".to_string(),
            ..CompanyRecord::default()
        },
        CompanyRecord {
            name: "UBER".to_string(),
            industry: "New".to_string(),
            ..CompanyRecord::default()
        },
    ]);

    assert_eq!(kb.len(), 2);
    assert_eq!(kb.stats().companies, vec!["uber", "airbnb"]);
    assert_eq!(kb.get("uber").map(|record| record.industry.as_str()), Some("New"));
}

#[test]
fn stats_lists_sorted_industries() {
    let stats = KnowledgeBase::builtin().stats();

    assert_eq!(stats.total_companies, 4);
    assert_eq!(
        stats.industries,
        vec![
            "Cloud Storage",
            "EdTech/Language Learning",
            "Transportation",
            "Travel/Hospitality"
        ]
    );
    assert_eq!(stats.companies, vec!["beelinguapp", "airbnb", "uber", "dropbox"]);
}

#[test]
fn rank_scores_builtin_companies() {
    let ranked = KnowledgeBase::builtin().rank(&edtech_profile(), 3);
    let summary: Vec<(&str, u32)> = ranked
        .iter()
        .map(|c| (c.record.name.as_str(), c.relevance_score))
        .collect();

    assert_eq!(summary, vec![("Beelinguapp", 7), ("Dropbox", 3), ("Uber", 1)]);
}

#[tokio::test]
async fn find_similar_matches_rank() {
    let kb = KnowledgeBase::builtin();
    let profile = edtech_profile();

    let via_trait = kb.find_similar(&profile, 2).await;
    assert_eq!(via_trait, kb.rank(&profile, 2));
    assert_eq!(via_trait.len(), 2);
}

#[test]
fn keyword_search_pins_requested_company() {
    let kb = KnowledgeBase::builtin();
    let results = kb.keyword_search("language learning EdTech", Some("beelinguapp"), 3);

    let names: Vec<&str> = results.iter().map(|record| record.name.as_str()).collect();
    // pinned entry plus its own keyword match
    assert_eq!(names, vec!["Beelinguapp", "Beelinguapp"]);
}

#[test]
fn keyword_search_matches_problem_and_solution() {
    let kb = KnowledgeBase::builtin();

    let results = kb.keyword_search("synchronization", None, 5);
    let names: Vec<&str> = results.iter().map(|record| record.name.as_str()).collect();
    assert_eq!(names, vec!["Dropbox"]);

    let results = kb.keyword_search("taxi", None, 5);
    assert_eq!(results[0].name, "Uber");
}

#[test]
fn keyword_search_falls_back_to_first_records() {
    let kb = KnowledgeBase::builtin();
    let results = kb.keyword_search("quantum agriculture", None, 2);

    let names: Vec<&str> = results.iter().map(|record| record.name.as_str()).collect();
    assert_eq!(names, vec!["Beelinguapp", "Airbnb"]);
}

#[test]
fn keyword_search_truncates_to_k() {
    let kb = KnowledgeBase::builtin();
    // "a" occurs in every industry
    assert_eq!(kb.keyword_search("a", None, 2).len(), 2);
    assert!(kb.keyword_search("a", None, 0).is_empty());
}
