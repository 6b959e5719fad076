#![cfg(feature = "ledger")]

use mutabakat::core::AccountChart;
use mutabakat::ledger::{load_ledger, merge_ledgers};
use rust_decimal_macros::dec;

const EDEFTER: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<xbrli:xbrl xmlns:xbrli="http://www.xbrl.org/2003/instance"
            xmlns:gl-cor="http://www.xbrl.org/int/gl/cor/2006-10-25">
  <xbrli:context id="c1">
    <xbrli:entity>
      <xbrli:identifier scheme="http://www.gib.gov.tr">9980735761</xbrli:identifier>
    </xbrli:entity>
  </xbrli:context>
  <gl-cor:entryHeader>
    <gl-cor:entryDetail>
      <gl-cor:accountMainID>153.01</gl-cor:accountMainID>
      <gl-cor:amount>1000.00</gl-cor:amount>
      <gl-cor:debitCreditCode>D</gl-cor:debitCreditCode>
      <gl-cor:postingDate>2025-10-05</gl-cor:postingDate>
      <gl-cor:documentType>invoice</gl-cor:documentType>
      <gl-cor:documentNumber>ABC2025000000001</gl-cor:documentNumber>
    </gl-cor:entryDetail>
    <gl-cor:entryDetail>
      <gl-cor:accountMainID>320.01</gl-cor:accountMainID>
      <gl-cor:amount>1000.00</gl-cor:amount>
      <gl-cor:debitCreditCode>C</gl-cor:debitCreditCode>
      <gl-cor:postingDate>2025-10-05</gl-cor:postingDate>
      <gl-cor:documentType>invoice</gl-cor:documentType>
      <gl-cor:documentNumber>ABC2025000000001</gl-cor:documentNumber>
    </gl-cor:entryDetail>
  </gl-cor:entryHeader>
</xbrli:xbrl>"#;

const KEBIR: &str = r#"<html><body>
  <div class="style12">320</div>
  <div class="style14">SATICILAR</div>
  <div class="style37">06.10.2025</div>
  <div class="style39">DEF2025000000002</div>
  <div class="style41">alis, Mahsup, 2, BASKA LTD, fatura</div>
  <div class="style42">750,00</div>
</body></html>"#;

#[test]
fn dispatches_on_extension() {
    let dir = tempfile::tempdir().unwrap();
    let chart = AccountChart::default();

    let edefter_path = dir.path().join("kebir-2025-10.xml");
    std::fs::write(&edefter_path, EDEFTER).unwrap();
    let book = load_ledger(&edefter_path, &chart).unwrap();
    assert_eq!(book.owner_tax_id.as_deref(), Some("9980735761"));
    assert_eq!(book.len(), 1);
    assert_eq!(book.get("ABC2025000000001").unwrap().total_debit, dec!(1000));

    let kebir_path = dir.path().join("kebir-2025-10.html");
    std::fs::write(&kebir_path, KEBIR).unwrap();
    let book = load_ledger(&kebir_path, &chart).unwrap();
    assert_eq!(book.len(), 1);
    assert_eq!(book.get("DEF2025000000002").unwrap().total_debit, dec!(750));
}

#[test]
fn missing_ledger_file_is_fatal() {
    let chart = AccountChart::default();
    assert!(load_ledger(std::path::Path::new("/nonexistent/defter.xml"), &chart).is_err());
}

#[test]
fn sources_merge_with_first_wins() {
    let dir = tempfile::tempdir().unwrap();
    let chart = AccountChart::default();

    let a = dir.path().join("a.xml");
    std::fs::write(&a, EDEFTER).unwrap();
    let b = dir.path().join("b.html");
    std::fs::write(&b, KEBIR).unwrap();

    let books = vec![
        load_ledger(&a, &chart).unwrap(),
        load_ledger(&b, &chart).unwrap(),
        load_ledger(&a, &chart).unwrap(),
    ];
    let (merged, conflicts) = merge_ledgers(books);
    assert_eq!(merged.len(), 2);
    assert_eq!(conflicts, 1);
    assert_eq!(merged.owner_tax_id.as_deref(), Some("9980735761"));
    assert!(merged.contains("ABC2025000000001"));
    assert!(merged.contains("DEF2025000000002"));
}
