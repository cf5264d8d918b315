//! Walks a renewal and a termination through review against a throwaway
//! database. Run with `RUST_LOG=contract_review=debug cargo run --example sled`.
use anyhow::Context;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use contract_review::{
    ActorContext, AuthorizationPolicy, ContractDetails, DecisionInput, DocumentUpload,
    FsDocumentStore, ReviewService, types::CalendarDate,
};

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let temp_dir = tempfile::tempdir()?;
    let db = Arc::new(sled::open(temp_dir.path().join("demo.db"))?);
    let documents = FsDocumentStore::new(temp_dir.path().join("documents"))?;
    let service = ReviewService::new(db, documents, AuthorizationPolicy::default())?;

    let admin = ActorContext::admin(100);
    let manager = ActorContext::manager(1);
    let backup = ActorContext::manager(2);

    let end_date = CalendarDate::from_ymd(2025, 12, 31).context("bad end date")?;
    let hosting = service.register_contract(
        ContractDetails::new("CT1")
            .set_vendor_name("Northwind Hosting")
            .set_contract_type("Services")
            .set_end_date(end_date)
            .set_owner(1)
            .set_backup(2)
            .set_owner_manager(3),
    )?;
    let cleaning = service.register_contract(
        ContractDetails::new("CT2")
            .set_vendor_name("Spotless Ltd")
            .set_contract_type("Facilities")
            .set_end_date(end_date)
            .set_owner(1)
            .set_backup(2)
            .set_owner_manager(3),
    )?;

    // Renewal: submitted, sent back for a signature, resubmitted, completed
    service.submit_decision(
        &manager,
        hosting.id,
        DecisionInput::renew("2026-06-30").with_comments("Renew for another term"),
    )?;
    service.send_back(&admin, hosting.id, "Missing signature")?;
    service.submit_decision(
        &backup,
        hosting.id,
        DecisionInput::renew("2026-12-31").with_document(
            DocumentUpload::new("Signed renewal", "2025-06-01", b"%PDF-1.7 renewal".to_vec())
                .set_file_name("renewal.pdf"),
        ),
    )?;

    // Termination: staged first, then submitted with the letter
    service.save_progress(&manager, cleaning.id, DecisionInput::terminate())?;
    service.submit_decision(
        &manager,
        cleaning.id,
        DecisionInput::terminate().with_document(DocumentUpload::new(
            "Termination Letter",
            "2025-01-10",
            b"%PDF-1.7 termination".to_vec(),
        )),
    )?;

    println!("Admin worklist:");
    for view in service.list_active_updates(&admin)? {
        println!(
            "  {} {:<18} {:<8} {:<16} {}",
            view.contract_code,
            view.vendor_name,
            view.status_label,
            view.my_role.as_str(),
            view.decision.map_or("-", |decision| decision.as_str()),
        );
    }

    let hosting = service.complete_review(&admin, hosting.id)?;
    let cleaning = service.complete_review(&admin, cleaning.id)?;
    println!("{} now ends {} ({})", hosting.code, hosting.end_date, hosting.status.as_str());
    println!("{} is {}", cleaning.code, cleaning.status.as_str());

    for update in service.history(&admin, hosting.id)? {
        println!(
            "  update {} {} returned={:?} corrected={}",
            update.id,
            update.status,
            update.returned_reason,
            update.correction_date.is_some()
        );
    }

    let orphans = service.sweep_orphan_documents(&admin, false)?;
    println!("orphaned documents: {}", orphans.len());

    service.flush()?;
    Ok(())
}
