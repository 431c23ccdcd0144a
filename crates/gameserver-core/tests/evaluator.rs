use std::fs;

use anyhow::Result;
use gameserver_core::{DownloadDecision, FetchReason, evaluate};
use gameserver_fsops::{RECORD_FILE_NAME, RecordStatus};
use gameserver_test_support::{DescriptorFixture, temp_dir, write_record_for};

#[test]
fn descriptor_without_content_ref_is_not_applicable() -> Result<()> {
    let dir = temp_dir("eval")?;
    let descriptor = DescriptorFixture::new("mc", dir.path())
        .executable(&dir.path().join("server.jar"))
        .build()?;
    assert_eq!(evaluate(&descriptor, false), DownloadDecision::NotApplicable);
    assert_eq!(evaluate(&descriptor, true), DownloadDecision::NotApplicable);
    Ok(())
}

#[test]
fn missing_record_means_never_fetched() -> Result<()> {
    let dir = temp_dir("eval")?;
    let descriptor = DescriptorFixture::new("vh", dir.path())
        .content_ref("896660")
        .build()?;
    assert_eq!(
        evaluate(&descriptor, false),
        DownloadDecision::NeedsFetch(FetchReason::NeverFetched)
    );
    Ok(())
}

#[test]
fn force_wins_over_a_fresh_record() -> Result<()> {
    let dir = temp_dir("eval")?;
    let descriptor = DescriptorFixture::new("vh", dir.path())
        .content_ref("896660")
        .build()?;
    write_record_for(&descriptor, "896660", RecordStatus::Success)?;
    assert_eq!(
        evaluate(&descriptor, true),
        DownloadDecision::NeedsFetch(FetchReason::Forced)
    );
    Ok(())
}

#[test]
fn matching_successful_record_is_up_to_date() -> Result<()> {
    let dir = temp_dir("eval")?;
    let descriptor = DescriptorFixture::new("vh", dir.path())
        .content_ref("896660_public-test")
        .build()?;
    let record = write_record_for(&descriptor, "896660_public-test", RecordStatus::Success)?;
    assert_eq!(
        evaluate(&descriptor, false),
        DownloadDecision::UpToDate(record)
    );
    Ok(())
}

#[test]
fn explicit_stable_branch_matches_the_short_form() -> Result<()> {
    let dir = temp_dir("eval")?;
    let descriptor = DescriptorFixture::new("vh", dir.path())
        .content_ref("896660_stable")
        .build()?;
    write_record_for(&descriptor, "896660", RecordStatus::Success)?;
    assert!(matches!(
        evaluate(&descriptor, false),
        DownloadDecision::UpToDate(_)
    ));
    Ok(())
}

#[test]
fn branch_change_makes_the_record_stale() -> Result<()> {
    let dir = temp_dir("eval")?;
    write_record_for(
        &DescriptorFixture::new("pz", dir.path())
            .content_ref("380870")
            .build()?,
        "380870",
        RecordStatus::Success,
    )?;
    let changed = DescriptorFixture::new("pz", dir.path())
        .content_ref("380870_unstable")
        .build()?;
    assert_eq!(
        evaluate(&changed, false),
        DownloadDecision::NeedsFetch(FetchReason::ContentRefChanged)
    );
    Ok(())
}

#[test]
fn failed_record_needs_refetch() -> Result<()> {
    let dir = temp_dir("eval")?;
    let descriptor = DescriptorFixture::new("vh", dir.path())
        .content_ref("896660")
        .build()?;
    write_record_for(&descriptor, "896660", RecordStatus::Failed)?;
    assert_eq!(
        evaluate(&descriptor, false),
        DownloadDecision::NeedsFetch(FetchReason::PreviousFailure)
    );
    Ok(())
}

#[test]
fn changed_reference_takes_precedence_over_failure() -> Result<()> {
    let dir = temp_dir("eval")?;
    let descriptor = DescriptorFixture::new("vh", dir.path())
        .content_ref("896660_beta")
        .build()?;
    write_record_for(&descriptor, "896660", RecordStatus::Failed)?;
    assert_eq!(
        evaluate(&descriptor, false),
        DownloadDecision::NeedsFetch(FetchReason::ContentRefChanged)
    );
    Ok(())
}

#[test]
fn malformed_records_are_corrupt_not_fatal() -> Result<()> {
    let dir = temp_dir("eval")?;
    let descriptor = DescriptorFixture::new("vh", dir.path())
        .content_ref("896660")
        .build()?;
    let record = dir.path().join(RECORD_FILE_NAME);

    for contents in ["", "{", "[]", r#"{"status":"success"}"#, "\u{0}\u{1}binary"] {
        fs::write(&record, contents)?;
        assert_eq!(
            evaluate(&descriptor, false),
            DownloadDecision::NeedsFetch(FetchReason::CorruptRecord),
            "contents {contents:?}"
        );
    }
    Ok(())
}
