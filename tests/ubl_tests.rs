#![cfg(feature = "ubl")]

use chrono::NaiveDate;
use mutabakat::ubl::parse_invoice;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

const FULL_INVOICE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<Invoice xmlns="urn:oasis:names:specification:ubl:schema:xsd:Invoice-2"
         xmlns:cbc="urn:oasis:names:specification:ubl:schema:xsd:CommonBasicComponents-2"
         xmlns:cac="urn:oasis:names:specification:ubl:schema:xsd:CommonAggregateComponents-2">
  <cbc:ProfileID>TICARIFATURA</cbc:ProfileID>
  <cbc:ID>GIB2025000000042</cbc:ID>
  <cbc:UUID>f47ac10b-58cc-4372-a567-0e02b2c3d479</cbc:UUID>
  <cbc:IssueDate>2025-10-05</cbc:IssueDate>
  <cbc:InvoiceTypeCode>SATIS</cbc:InvoiceTypeCode>
  <cbc:Note>Yedi gün içinde ödenecektir.</cbc:Note>
  <cbc:DocumentCurrencyCode>TRY</cbc:DocumentCurrencyCode>
  <cac:OrderReference>
    <cbc:ID>SIP-2025-77</cbc:ID>
    <cbc:IssueDate>2025-10-01</cbc:IssueDate>
  </cac:OrderReference>
  <cac:DespatchDocumentReference>
    <cbc:ID>IRS-2025-12</cbc:ID>
    <cbc:IssueDate>2025-10-04</cbc:IssueDate>
  </cac:DespatchDocumentReference>
  <cac:AccountingSupplierParty>
    <cac:Party>
      <cac:PartyIdentification>
        <cbc:ID schemeID="VKN">1111111111</cbc:ID>
      </cac:PartyIdentification>
      <cac:PartyName><cbc:Name>Tedarik Ltd</cbc:Name></cac:PartyName>
      <cac:PostalAddress>
        <cbc:StreetName>Atatürk Cad.</cbc:StreetName>
        <cbc:BuildingNumber>12</cbc:BuildingNumber>
        <cbc:CitySubdivisionName>Kadıköy</cbc:CitySubdivisionName>
        <cbc:CityName>İstanbul</cbc:CityName>
      </cac:PostalAddress>
      <cac:PartyTaxScheme>
        <cac:TaxScheme><cbc:Name>Kadıköy VD</cbc:Name></cac:TaxScheme>
      </cac:PartyTaxScheme>
      <cac:PartyLegalEntity>
        <cbc:RegistrationName>Tedarik Sanayi ve Ticaret Ltd. Şti.</cbc:RegistrationName>
      </cac:PartyLegalEntity>
    </cac:Party>
  </cac:AccountingSupplierParty>
  <cac:AccountingCustomerParty>
    <cac:Party>
      <cac:PartyIdentification>
        <cbc:ID schemeID="TCKN">12345678901</cbc:ID>
      </cac:PartyIdentification>
      <cac:Person>
        <cbc:FirstName>Ayşe</cbc:FirstName>
        <cbc:FamilyName>Yılmaz</cbc:FamilyName>
      </cac:Person>
    </cac:Party>
  </cac:AccountingCustomerParty>
  <cac:PaymentMeans>
    <cac:PayeeFinancialAccount>
      <cbc:ID>TR330006100519786457841326</cbc:ID>
    </cac:PayeeFinancialAccount>
  </cac:PaymentMeans>
  <cac:TaxTotal>
    <cbc:TaxAmount currencyID="TRY">220.00</cbc:TaxAmount>
    <cac:TaxSubtotal>
      <cbc:TaxableAmount currencyID="TRY">1000.00</cbc:TaxableAmount>
      <cbc:TaxAmount currencyID="TRY">200.00</cbc:TaxAmount>
      <cbc:Percent>20</cbc:Percent>
      <cac:TaxCategory>
        <cac:TaxScheme><cbc:TaxTypeCode>0015</cbc:TaxTypeCode></cac:TaxScheme>
      </cac:TaxCategory>
    </cac:TaxSubtotal>
    <cac:TaxSubtotal>
      <cbc:TaxableAmount currencyID="TRY">1000.00</cbc:TaxableAmount>
      <cbc:TaxAmount currencyID="TRY">20.00</cbc:TaxAmount>
      <cbc:Percent>2</cbc:Percent>
      <cac:TaxCategory>
        <cac:TaxScheme><cbc:TaxTypeCode>0059</cbc:TaxTypeCode></cac:TaxScheme>
      </cac:TaxCategory>
    </cac:TaxSubtotal>
  </cac:TaxTotal>
  <cac:LegalMonetaryTotal>
    <cbc:LineExtensionAmount currencyID="TRY">1000.00</cbc:LineExtensionAmount>
    <cbc:TaxExclusiveAmount currencyID="TRY">1000.00</cbc:TaxExclusiveAmount>
    <cbc:TaxInclusiveAmount currencyID="TRY">1220.00</cbc:TaxInclusiveAmount>
    <cbc:PayableAmount currencyID="TRY">1220.00</cbc:PayableAmount>
  </cac:LegalMonetaryTotal>
  <cac:InvoiceLine>
    <cbc:ID>1</cbc:ID>
    <cbc:InvoicedQuantity unitCode="C62">2</cbc:InvoicedQuantity>
    <cbc:LineExtensionAmount currencyID="TRY">1000.00</cbc:LineExtensionAmount>
    <cac:Item>
      <cbc:Name>Hizmet Bedeli</cbc:Name>
      <cbc:Description>Ekim ayı danışmanlık</cbc:Description>
    </cac:Item>
    <cac:Price><cbc:PriceAmount currencyID="TRY">500.00</cbc:PriceAmount></cac:Price>
    <cac:TaxTotal>
      <cac:TaxSubtotal>
        <cbc:TaxAmount currencyID="TRY">200.00</cbc:TaxAmount>
        <cac:TaxCategory>
          <cbc:Percent>20</cbc:Percent>
          <cac:TaxScheme><cbc:TaxTypeCode>0015</cbc:TaxTypeCode></cac:TaxScheme>
        </cac:TaxCategory>
      </cac:TaxSubtotal>
    </cac:TaxTotal>
  </cac:InvoiceLine>
</Invoice>"#;

#[test]
fn parses_a_complete_commercial_invoice() {
    let invoice = parse_invoice(FULL_INVOICE.as_bytes(), "full.xml").unwrap();

    assert_eq!(invoice.number, "GIB2025000000042");
    assert_eq!(
        invoice.ettn.as_deref(),
        Some("f47ac10b-58cc-4372-a567-0e02b2c3d479")
    );
    assert_eq!(invoice.profile_id.as_deref(), Some("TICARIFATURA"));
    assert_eq!(invoice.type_code.as_deref(), Some("SATIS"));
    assert_eq!(
        invoice.issue_date,
        NaiveDate::from_ymd_opt(2025, 10, 5)
    );
    assert_eq!(invoice.currency_code, "TRY");
    assert_eq!(invoice.vat_period().as_deref(), Some("2025/10"));

    assert_eq!(invoice.gross_amount, dec!(1220.00));
    assert_eq!(invoice.tax_exclusive_amount, dec!(1000.00));
    assert_eq!(invoice.vat_amount, dec!(200.00));
    assert_eq!(invoice.other_tax_amount, dec!(20.00));
    assert_eq!(invoice.withholding_amount, Decimal::ZERO);
    assert_eq!(invoice.tax_breakdown.len(), 2);
    assert_eq!(invoice.tax_breakdown[0].type_code, "0015");
    assert_eq!(invoice.tax_breakdown[0].rate, dec!(20));

    // Registered legal name wins over the trading name.
    assert_eq!(invoice.supplier.name, "Tedarik Sanayi ve Ticaret Ltd. Şti.");
    assert_eq!(invoice.supplier.tax_id.as_deref(), Some("1111111111"));
    assert_eq!(invoice.supplier.tax_office.as_deref(), Some("Kadıköy VD"));
    assert_eq!(invoice.supplier.address.as_deref(), Some("Atatürk Cad. No:12"));
    assert_eq!(invoice.supplier.city.as_deref(), Some("İstanbul"));
    assert_eq!(invoice.supplier.district.as_deref(), Some("Kadıköy"));

    // Natural person: first + family name.
    assert_eq!(invoice.customer.name, "Ayşe Yılmaz");
    assert_eq!(invoice.customer.tax_id.as_deref(), Some("12345678901"));

    assert_eq!(invoice.lines.len(), 1);
    let line = &invoice.lines[0];
    assert_eq!(line.description, "Hizmet Bedeli (Ekim ayı danışmanlık)");
    assert_eq!(line.quantity, dec!(2));
    assert_eq!(line.unit, "C62");
    assert_eq!(line.unit_price, dec!(500.00));
    assert_eq!(line.vat_rate, dec!(20));
    assert_eq!(line.line_total, dec!(1000.00));

    assert_eq!(invoice.notes, ["Yedi gün içinde ödenecektir."]);
    assert_eq!(invoice.order_refs, ["SIP-2025-77 (2025-10-01)"]);
    assert_eq!(invoice.despatch_refs, ["IRS-2025-12 (2025-10-04)"]);
    assert_eq!(invoice.payment_means, ["IBAN: TR330006100519786457841326"]);
    assert_eq!(invoice.source_file, "full.xml");
}

#[test]
fn header_tax_amount_without_subtotals_counts_as_vat() {
    let xml = r#"<Invoice>
      <ID>ABC2025000000010</ID>
      <IssueDate>2025-03-02</IssueDate>
      <TaxTotal><TaxAmount>180.00</TaxAmount></TaxTotal>
      <LegalMonetaryTotal>
        <TaxInclusiveAmount>1180.00</TaxInclusiveAmount>
        <PayableAmount>1180.00</PayableAmount>
      </LegalMonetaryTotal>
    </Invoice>"#;
    let invoice = parse_invoice(xml.as_bytes(), "old-format.xml").unwrap();
    assert_eq!(invoice.vat_amount, dec!(180.00));
    assert_eq!(invoice.tax_exclusive_amount, dec!(1000.00));
}

#[test]
fn missing_vat_is_rederived_from_the_totals() {
    // Declared figures: gross 1180, matrah 1000, no tax totals at all.
    let xml = r#"<Invoice>
      <ID>ABC2025000000011</ID>
      <LegalMonetaryTotal>
        <TaxExclusiveAmount>1000.00</TaxExclusiveAmount>
        <TaxInclusiveAmount>1180.00</TaxInclusiveAmount>
        <PayableAmount>1180.00</PayableAmount>
      </LegalMonetaryTotal>
    </Invoice>"#;
    let invoice = parse_invoice(xml.as_bytes(), "no-tax.xml").unwrap();
    assert_eq!(invoice.vat_amount, dec!(180.00));
}

#[test]
fn currency_falls_back_to_the_payable_amount_attribute() {
    let xml = r#"<Invoice>
      <ID>ABC2025000000012</ID>
      <ExchangeRate/>
      <PricingExchangeRate>
        <SourceCurrencyCode>USD</SourceCurrencyCode>
        <TargetCurrencyCode>TRY</TargetCurrencyCode>
        <CalculationRate>34.1234</CalculationRate>
      </PricingExchangeRate>
      <LegalMonetaryTotal>
        <PayableAmount currencyID="USD">250.00</PayableAmount>
      </LegalMonetaryTotal>
    </Invoice>"#;
    let invoice = parse_invoice(xml.as_bytes(), "usd.xml").unwrap();
    assert_eq!(invoice.currency_code, "USD");
    assert_eq!(invoice.gross_amount, dec!(250.00));
    assert_eq!(invoice.embedded_rate, Some(dec!(34.1234)));
}

#[test]
fn document_without_number_is_rejected() {
    let xml = r#"<Invoice>
      <LegalMonetaryTotal><PayableAmount>10.00</PayableAmount></LegalMonetaryTotal>
    </Invoice>"#;
    let err = parse_invoice(xml.as_bytes(), "anon.xml").unwrap_err();
    assert!(err.to_string().contains("no invoice number"));
}

#[test]
fn document_without_totals_is_rejected() {
    let xml = r#"<Invoice><ID>ABC2025000000013</ID></Invoice>"#;
    let err = parse_invoice(xml.as_bytes(), "empty.xml").unwrap_err();
    assert!(err.to_string().contains("no monetary total"));
}

#[test]
fn windows_1254_document_decodes() {
    // "Danışmanlık" with 0xFD for the dotless ı, declared as ISO-8859-9.
    let mut xml = Vec::new();
    xml.extend_from_slice(br#"<?xml version="1.0" encoding="ISO-8859-9"?>
    <Invoice>
      <ID>ABC2025000000014</ID>
      <Note>Dan"#);
    xml.push(0xFD);
    xml.extend_from_slice(b"\xFEmanl");
    xml.push(0xFD);
    xml.extend_from_slice(br#"k</Note>
      <LegalMonetaryTotal><PayableAmount>100.00</PayableAmount></LegalMonetaryTotal>
    </Invoice>"#);

    let invoice = parse_invoice(&xml, "legacy.xml").unwrap();
    assert_eq!(invoice.notes, ["Danışmanlık"]);
}

#[test]
fn withholding_total_is_kept_apart_from_vat() {
    let xml = r#"<Invoice>
      <ID>ABC2025000000015</ID>
      <WithholdingTaxTotal><TaxAmount>90.00</TaxAmount></WithholdingTaxTotal>
      <TaxTotal>
        <TaxAmount>100.00</TaxAmount>
        <TaxSubtotal>
          <TaxableAmount>500.00</TaxableAmount>
          <TaxAmount>100.00</TaxAmount>
          <TaxCategory><TaxScheme><TaxTypeCode>0015</TaxTypeCode></TaxScheme></TaxCategory>
        </TaxSubtotal>
      </TaxTotal>
      <LegalMonetaryTotal>
        <TaxInclusiveAmount>600.00</TaxInclusiveAmount>
        <PayableAmount>510.00</PayableAmount>
      </LegalMonetaryTotal>
    </Invoice>"#;
    let invoice = parse_invoice(xml.as_bytes(), "tevkifat.xml").unwrap();
    assert_eq!(invoice.vat_amount, dec!(100.00));
    assert_eq!(invoice.withholding_amount, dec!(90.00));
    assert_eq!(invoice.gross_amount, dec!(600.00));
}
